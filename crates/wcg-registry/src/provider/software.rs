//! The software subtle-crypto provider: a real, non-PKCS#11 backend so
//! the dispatcher has something concrete to route every action to.
//!
//! Algorithm coverage is deliberately the set actually exercised by the
//! protocol's testable properties and end-to-end scenarios: digest,
//! RSASSA-PKCS1-v1_5, ECDSA P-256, ECDH P-256, AES-256-GCM, and
//! HKDF/HMAC-SHA-256. A PKCS#11-token-backed provider would implement
//! the same [`Provider`] trait against hardware instead.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use p256::{PublicKey as P256PublicKey, SecretKey as P256SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::pkcs8::{DecodePrivateKey as RsaDecodePrivateKey, DecodePublicKey as RsaDecodePublicKey};
use rsa::pkcs8::{EncodePrivateKey as RsaEncodePrivateKey, EncodePublicKey as RsaEncodePublicKey};
use rsa::signature::{Signer as RsaSigner, Verifier as RsaVerifier};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use wcg_protocol::actions::AlgorithmParams;

use super::{Provider, ProviderCryptoInfo};
use crate::error::RegistryError;
use crate::object::{CryptoObject, GeneratedKey, PrivateKeyMaterial, PublicKeyMaterial, SecretKeyMaterial};

type HmacSha256 = Hmac<Sha256>;

/// Default RSA modulus size for `GenerateKey`; callers may override via
/// `algorithm.modulus_length`.
const DEFAULT_RSA_BITS: usize = 2048;

pub struct SoftwareProvider {
    id: String,
}

impl SoftwareProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Provider for SoftwareProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> ProviderCryptoInfo {
        ProviderCryptoInfo {
            id: self.id.clone(),
            name: "Software".to_string(),
            is_hardware: false,
        }
    }

    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>, RegistryError> {
        match algorithm {
            "SHA-256" => Ok(Sha256::digest_bytes(data)),
            other => Err(RegistryError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn generate_key(
        &self,
        algorithm: &AlgorithmParams,
        _extractable: bool,
        _usages: &[String],
    ) -> Result<GeneratedKey, RegistryError> {
        match algorithm.name.as_str() {
            "RSASSA-PKCS1-v1_5" => {
                let bits = algorithm.modulus_length.map_or(DEFAULT_RSA_BITS, |n| n as usize);
                let private = RsaPrivateKey::new(&mut OsRng, bits)
                    .map_err(|e| RegistryError::KeyGeneration(e.to_string()))?;
                let public = private.to_public_key();
                Ok(GeneratedKey::Pair {
                    public: CryptoObject::Public(PublicKeyMaterial::Rsa(public)),
                    private: CryptoObject::Private(PrivateKeyMaterial::Rsa(private)),
                })
            }
            "ECDSA" => {
                let signing_key = P256SigningKey::random(&mut OsRng);
                let verifying_key = P256VerifyingKey::from(&signing_key);
                Ok(GeneratedKey::Pair {
                    public: CryptoObject::Public(PublicKeyMaterial::EcdsaP256(verifying_key)),
                    private: CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(signing_key)),
                })
            }
            "ECDH" => {
                let secret = P256SecretKey::random(&mut OsRng);
                let public = secret.public_key();
                Ok(GeneratedKey::Pair {
                    public: CryptoObject::Public(PublicKeyMaterial::EcdhP256(public)),
                    private: CryptoObject::Private(PrivateKeyMaterial::EcdhP256(secret)),
                })
            }
            "AES-GCM" => {
                let mut key = [0u8; 32];
                OsRng.fill_bytes(&mut key);
                Ok(GeneratedKey::Secret(CryptoObject::Secret(SecretKeyMaterial::AesGcm256(key))))
            }
            "HMAC" => {
                let mut key = [0u8; 32];
                OsRng.fill_bytes(&mut key);
                Ok(GeneratedKey::Secret(CryptoObject::Secret(SecretKeyMaterial::HmacSha256(key))))
            }
            other => Err(RegistryError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn sign(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        data: &[u8],
    ) -> Result<Vec<u8>, RegistryError> {
        match (algorithm.name.as_str(), key) {
            ("RSASSA-PKCS1-v1_5", CryptoObject::Private(PrivateKeyMaterial::Rsa(private))) => {
                let signing_key = RsaSigningKey::<Sha256>::new(private.clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| RegistryError::Sign(e.to_string()))?;
                Ok(signature.to_vec())
            }
            ("ECDSA", CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(signing_key))) => {
                let signature: P256Signature = signing_key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            ("HMAC", CryptoObject::Secret(SecretKeyMaterial::HmacSha256(key_bytes))) => {
                let mut mac = HmacSha256::new_from_slice(key_bytes)
                    .map_err(|e| RegistryError::Sign(e.to_string()))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            (name, _) => Err(RegistryError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    fn verify(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool, RegistryError> {
        match (algorithm.name.as_str(), key) {
            ("RSASSA-PKCS1-v1_5", CryptoObject::Public(PublicKeyMaterial::Rsa(public))) => {
                let verifying_key = RsaVerifyingKey::<Sha256>::new(public.clone());
                let Ok(signature) = RsaSignature::try_from(signature) else {
                    return Ok(false);
                };
                Ok(verifying_key.verify(data, &signature).is_ok())
            }
            ("ECDSA", CryptoObject::Public(PublicKeyMaterial::EcdsaP256(verifying_key))) => {
                let Ok(signature) = P256Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(verifying_key.verify(data, &signature).is_ok())
            }
            ("HMAC", CryptoObject::Secret(SecretKeyMaterial::HmacSha256(key_bytes))) => {
                let Ok(mut mac) = HmacSha256::new_from_slice(key_bytes) else {
                    return Ok(false);
                };
                mac.update(data);
                Ok(mac.verify_slice(signature).is_ok())
            }
            (name, _) => Err(RegistryError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    fn encrypt(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        data: &[u8],
    ) -> Result<Vec<u8>, RegistryError> {
        match (algorithm.name.as_str(), key) {
            ("AES-GCM", CryptoObject::Secret(SecretKeyMaterial::AesGcm256(key_bytes))) => {
                let iv = algorithm
                    .iv
                    .as_ref()
                    .ok_or_else(|| RegistryError::Encrypt("AES-GCM requires an iv".to_string()))?;
                let cipher = Aes256Gcm::new_from_slice(key_bytes)
                    .map_err(|e| RegistryError::Encrypt(e.to_string()))?;
                cipher
                    .encrypt(Nonce::from_slice(iv), data)
                    .map_err(|e| RegistryError::Encrypt(e.to_string()))
            }
            (name, _) => Err(RegistryError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    fn decrypt(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        data: &[u8],
    ) -> Result<Vec<u8>, RegistryError> {
        match (algorithm.name.as_str(), key) {
            ("AES-GCM", CryptoObject::Secret(SecretKeyMaterial::AesGcm256(key_bytes))) => {
                let iv = algorithm
                    .iv
                    .as_ref()
                    .ok_or_else(|| RegistryError::Decrypt("AES-GCM requires an iv".to_string()))?;
                let cipher = Aes256Gcm::new_from_slice(key_bytes)
                    .map_err(|e| RegistryError::Decrypt(e.to_string()))?;
                cipher
                    .decrypt(Nonce::from_slice(iv), data)
                    .map_err(|e| RegistryError::Decrypt(e.to_string()))
            }
            (name, _) => Err(RegistryError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    fn derive_bits(
        &self,
        algorithm: &AlgorithmParams,
        base_key: &CryptoObject,
        peer_public: Option<&CryptoObject>,
        length: u32,
    ) -> Result<Vec<u8>, RegistryError> {
        match algorithm.name.as_str() {
            "ECDH" => {
                let CryptoObject::Private(PrivateKeyMaterial::EcdhP256(secret)) = base_key else {
                    return Err(RegistryError::WrongHandleKind);
                };
                let Some(CryptoObject::Public(PublicKeyMaterial::EcdhP256(peer))) = peer_public else {
                    return Err(RegistryError::Derive("ECDH requires a peer public key".to_string()));
                };
                let shared = p256::ecdh::diffie_hellman(
                    secret.to_nonzero_scalar(),
                    peer.as_affine(),
                );
                let bytes = shared.raw_secret_bytes().to_vec();
                Ok(truncate_or_expand(&bytes, length))
            }
            "HKDF" => {
                let CryptoObject::Secret(SecretKeyMaterial::HmacSha256(ikm)) = base_key else {
                    return Err(RegistryError::WrongHandleKind);
                };
                let salt = algorithm.salt.as_deref();
                let info = algorithm.info.as_deref().unwrap_or(b"");
                let hk = Hkdf::<Sha256>::new(salt, ikm);
                let len_bytes = usize::try_from(length.div_ceil(8))
                    .map_err(|e| RegistryError::Derive(e.to_string()))?;
                let mut okm = vec![0u8; len_bytes];
                hk.expand(info, &mut okm)
                    .map_err(|e| RegistryError::Derive(e.to_string()))?;
                Ok(okm)
            }
            other => Err(RegistryError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    fn import_key(
        &self,
        format: &str,
        key_data: &[u8],
        algorithm: &AlgorithmParams,
        _usages: &[String],
    ) -> Result<CryptoObject, RegistryError> {
        match (algorithm.name.as_str(), format) {
            ("AES-GCM", "raw") => {
                let bytes: [u8; 32] = key_data
                    .try_into()
                    .map_err(|_| RegistryError::Import("AES-256-GCM key must be 32 bytes".to_string()))?;
                Ok(CryptoObject::Secret(SecretKeyMaterial::AesGcm256(bytes)))
            }
            ("HMAC", "raw") => {
                let bytes: [u8; 32] = key_data
                    .try_into()
                    .map_err(|_| RegistryError::Import("HMAC-SHA-256 key must be 32 bytes".to_string()))?;
                Ok(CryptoObject::Secret(SecretKeyMaterial::HmacSha256(bytes)))
            }
            ("RSASSA-PKCS1-v1_5", "pkcs8") => {
                let private = RsaPrivateKey::from_pkcs8_der(key_data)
                    .map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Private(PrivateKeyMaterial::Rsa(private)))
            }
            ("RSASSA-PKCS1-v1_5", "spki") => {
                let public = RsaPublicKey::from_public_key_der(key_data)
                    .map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Public(PublicKeyMaterial::Rsa(public)))
            }
            ("ECDSA", "pkcs8") => {
                let signing_key = P256SigningKey::from_pkcs8_der(key_data)
                    .map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(signing_key)))
            }
            ("ECDSA", "spki" | "raw") => {
                let verifying_key = P256VerifyingKey::from_public_key_der(key_data)
                    .or_else(|_| P256VerifyingKey::from_sec1_bytes(key_data))
                    .map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Public(PublicKeyMaterial::EcdsaP256(verifying_key)))
            }
            ("ECDH", "pkcs8") => {
                let secret = P256SecretKey::from_pkcs8_der(key_data)
                    .map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Private(PrivateKeyMaterial::EcdhP256(secret)))
            }
            ("ECDH", "spki" | "raw") => {
                let public = P256PublicKey::from_public_key_der(key_data)
                    .or_else(|_| P256PublicKey::from_sec1_bytes(key_data))
                    .map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Public(PublicKeyMaterial::EcdhP256(public)))
            }
            (_, "jwk") => import_jwk(&algorithm.name, key_data),
            (name, format) => Err(RegistryError::UnsupportedAlgorithm(format!("{name}/{format}"))),
        }
    }

    fn export_key(&self, format: &str, object: &CryptoObject) -> Result<Vec<u8>, RegistryError> {
        match (format, object) {
            ("raw", CryptoObject::Secret(SecretKeyMaterial::AesGcm256(bytes))) => Ok(bytes.to_vec()),
            ("raw", CryptoObject::Secret(SecretKeyMaterial::HmacSha256(bytes))) => Ok(bytes.to_vec()),
            ("pkcs8", CryptoObject::Private(PrivateKeyMaterial::Rsa(private))) => private
                .to_pkcs8_der()
                .map(|d| d.as_bytes().to_vec())
                .map_err(|e| RegistryError::Export(e.to_string())),
            ("spki", CryptoObject::Public(PublicKeyMaterial::Rsa(public))) => public
                .to_public_key_der()
                .map(|d| d.into_vec())
                .map_err(|e| RegistryError::Export(e.to_string())),
            ("pkcs8", CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(signing_key))) => signing_key
                .to_pkcs8_der()
                .map(|d| d.as_bytes().to_vec())
                .map_err(|e| RegistryError::Export(e.to_string())),
            ("spki" | "raw", CryptoObject::Public(PublicKeyMaterial::EcdsaP256(verifying_key))) => {
                if format == "raw" {
                    Ok(verifying_key.to_sec1_bytes().to_vec())
                } else {
                    verifying_key
                        .to_public_key_der()
                        .map(|d| d.into_vec())
                        .map_err(|e| RegistryError::Export(e.to_string()))
                }
            }
            ("pkcs8", CryptoObject::Private(PrivateKeyMaterial::EcdhP256(secret))) => secret
                .to_pkcs8_der()
                .map(|d| d.as_bytes().to_vec())
                .map_err(|e| RegistryError::Export(e.to_string())),
            ("spki" | "raw", CryptoObject::Public(PublicKeyMaterial::EcdhP256(public))) => {
                if format == "raw" {
                    Ok(public.to_sec1_bytes().to_vec())
                } else {
                    public
                        .to_public_key_der()
                        .map(|d| d.into_vec())
                        .map_err(|e| RegistryError::Export(e.to_string()))
                }
            }
            ("jwk", CryptoObject::Secret(SecretKeyMaterial::AesGcm256(bytes))) => {
                Ok(export_jwk_oct(bytes, "A256GCM"))
            }
            ("jwk", CryptoObject::Secret(SecretKeyMaterial::HmacSha256(bytes))) => {
                Ok(export_jwk_oct(bytes, "HS256"))
            }
            ("jwk", CryptoObject::Public(PublicKeyMaterial::Rsa(public))) => {
                let jwk = serde_json::json!({
                    "kty": "RSA",
                    "n": b64url_encode(&public.n().to_bytes_be()),
                    "e": b64url_encode(&public.e().to_bytes_be()),
                    "ext": true,
                });
                Ok(jwk.to_string().into_bytes())
            }
            ("jwk", CryptoObject::Private(PrivateKeyMaterial::Rsa(private))) => {
                let primes = private.primes();
                let p = primes
                    .first()
                    .ok_or_else(|| RegistryError::Export("RSA private key has no prime factors".to_string()))?;
                let q = primes
                    .get(1)
                    .ok_or_else(|| RegistryError::Export("RSA private key has only one prime factor".to_string()))?;
                let jwk = serde_json::json!({
                    "kty": "RSA",
                    "n": b64url_encode(&private.n().to_bytes_be()),
                    "e": b64url_encode(&private.e().to_bytes_be()),
                    "d": b64url_encode(&private.d().to_bytes_be()),
                    "p": b64url_encode(&p.to_bytes_be()),
                    "q": b64url_encode(&q.to_bytes_be()),
                    "ext": true,
                });
                Ok(jwk.to_string().into_bytes())
            }
            ("jwk", CryptoObject::Public(PublicKeyMaterial::EcdsaP256(verifying_key))) => {
                let (x, y) = ec_point_xy(&verifying_key.to_sec1_bytes())?;
                Ok(export_jwk_ec_public(&x, &y))
            }
            ("jwk", CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(signing_key))) => {
                let (x, y) = ec_point_xy(&signing_key.verifying_key().to_sec1_bytes())?;
                Ok(export_jwk_ec_private(&x, &y, &signing_key.to_bytes()))
            }
            ("jwk", CryptoObject::Public(PublicKeyMaterial::EcdhP256(public))) => {
                let (x, y) = ec_point_xy(&public.to_sec1_bytes())?;
                Ok(export_jwk_ec_public(&x, &y))
            }
            ("jwk", CryptoObject::Private(PrivateKeyMaterial::EcdhP256(secret))) => {
                let (x, y) = ec_point_xy(&secret.public_key().to_sec1_bytes())?;
                Ok(export_jwk_ec_private(&x, &y, &secret.to_bytes()))
            }
            (format, _) => Err(RegistryError::UnsupportedAlgorithm(format.to_string())),
        }
    }
}

fn b64url_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn b64url_decode(s: &str) -> Result<Vec<u8>, RegistryError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| RegistryError::Import(format!("invalid base64url in JWK: {e}")))
}

fn export_jwk_oct(bytes: &[u8; 32], alg: &str) -> Vec<u8> {
    let jwk = serde_json::json!({
        "kty": "oct",
        "k": b64url_encode(bytes),
        "alg": alg,
        "ext": true,
    });
    jwk.to_string().into_bytes()
}

fn export_jwk_ec_public(x: &[u8], y: &[u8]) -> Vec<u8> {
    let jwk = serde_json::json!({
        "kty": "EC",
        "crv": "P-256",
        "x": b64url_encode(x),
        "y": b64url_encode(y),
        "ext": true,
    });
    jwk.to_string().into_bytes()
}

fn export_jwk_ec_private(x: &[u8], y: &[u8], d: &[u8]) -> Vec<u8> {
    let jwk = serde_json::json!({
        "kty": "EC",
        "crv": "P-256",
        "x": b64url_encode(x),
        "y": b64url_encode(y),
        "d": b64url_encode(d),
        "ext": true,
    });
    jwk.to_string().into_bytes()
}

/// Split an uncompressed SEC1 point (`0x04 || X || Y`) into its
/// coordinates for a JWK's `x`/`y` members.
fn ec_point_xy(sec1: &[u8]) -> Result<(Vec<u8>, Vec<u8>), RegistryError> {
    if sec1.len() != 65 || sec1[0] != 0x04 {
        return Err(RegistryError::Export("expected an uncompressed P-256 point".to_string()));
    }
    Ok((sec1[1..33].to_vec(), sec1[33..65].to_vec()))
}

fn jwk_field(value: &serde_json::Value, name: &str) -> Result<Vec<u8>, RegistryError> {
    let encoded = value
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RegistryError::Import(format!("JWK missing '{name}'")))?;
    b64url_decode(encoded)
}

/// `ImportKey("jwk", ...)`: parse the UTF-8 JSON body and dispatch on
/// `algorithm.name` the same way the other formats dispatch on their
/// DER/raw encodings.
fn import_jwk(algorithm_name: &str, key_data: &[u8]) -> Result<CryptoObject, RegistryError> {
    let value: serde_json::Value =
        serde_json::from_slice(key_data).map_err(|e| RegistryError::Import(format!("invalid JWK JSON: {e}")))?;

    match algorithm_name {
        "AES-GCM" => {
            let bytes: [u8; 32] = jwk_field(&value, "k")?
                .try_into()
                .map_err(|_| RegistryError::Import("AES-256-GCM JWK key must decode to 32 bytes".to_string()))?;
            Ok(CryptoObject::Secret(SecretKeyMaterial::AesGcm256(bytes)))
        }
        "HMAC" => {
            let bytes: [u8; 32] = jwk_field(&value, "k")?
                .try_into()
                .map_err(|_| RegistryError::Import("HMAC-SHA-256 JWK key must decode to 32 bytes".to_string()))?;
            Ok(CryptoObject::Secret(SecretKeyMaterial::HmacSha256(bytes)))
        }
        "RSASSA-PKCS1-v1_5" => {
            let n = BigUint::from_bytes_be(&jwk_field(&value, "n")?);
            let e = BigUint::from_bytes_be(&jwk_field(&value, "e")?);
            if value.get("d").is_some() {
                let d = BigUint::from_bytes_be(&jwk_field(&value, "d")?);
                let p = BigUint::from_bytes_be(&jwk_field(&value, "p")?);
                let q = BigUint::from_bytes_be(&jwk_field(&value, "q")?);
                let private = RsaPrivateKey::from_components(n, e, d, vec![p, q])
                    .map_err(|err| RegistryError::Import(err.to_string()))?;
                Ok(CryptoObject::Private(PrivateKeyMaterial::Rsa(private)))
            } else {
                let public = RsaPublicKey::new(n, e).map_err(|err| RegistryError::Import(err.to_string()))?;
                Ok(CryptoObject::Public(PublicKeyMaterial::Rsa(public)))
            }
        }
        "ECDSA" | "ECDH" => {
            let x = jwk_field(&value, "x")?;
            let y = jwk_field(&value, "y")?;
            let mut sec1 = Vec::with_capacity(65);
            sec1.push(0x04);
            sec1.extend_from_slice(&x);
            sec1.extend_from_slice(&y);

            if value.get("d").is_some() {
                let d = jwk_field(&value, "d")?;
                if algorithm_name == "ECDSA" {
                    let signing_key =
                        P256SigningKey::from_slice(&d).map_err(|e| RegistryError::Import(e.to_string()))?;
                    Ok(CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(signing_key)))
                } else {
                    let secret =
                        P256SecretKey::from_slice(&d).map_err(|e| RegistryError::Import(e.to_string()))?;
                    Ok(CryptoObject::Private(PrivateKeyMaterial::EcdhP256(secret)))
                }
            } else if algorithm_name == "ECDSA" {
                let verifying_key =
                    P256VerifyingKey::from_sec1_bytes(&sec1).map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Public(PublicKeyMaterial::EcdsaP256(verifying_key)))
            } else {
                let public =
                    P256PublicKey::from_sec1_bytes(&sec1).map_err(|e| RegistryError::Import(e.to_string()))?;
                Ok(CryptoObject::Public(PublicKeyMaterial::EcdhP256(public)))
            }
        }
        other => Err(RegistryError::UnsupportedAlgorithm(format!("{other}/jwk"))),
    }
}

/// `ECDH`/`HKDF` derive a fixed-width shared secret; truncate or
/// zero-pad to the caller-requested bit length.
fn truncate_or_expand(bytes: &[u8], length_bits: u32) -> Vec<u8> {
    let len = (length_bits as usize).div_ceil(8);
    let mut out = bytes.to_vec();
    out.resize(len, 0);
    out
}

trait DigestBytes {
    fn digest_bytes(data: &[u8]) -> Vec<u8>;
}

impl DigestBytes for Sha256 {
    fn digest_bytes(data: &[u8]) -> Vec<u8> {
        use sha2::Digest;
        Sha256::digest(data).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alg(name: &str) -> AlgorithmParams {
        AlgorithmParams {
            name: name.to_string(),
            hash: None,
            length: None,
            public_exponent: None,
            modulus_length: None,
            named_curve: None,
            iv: None,
            additional_data: None,
            tag_length: None,
            salt: None,
            info: None,
            public_handle: None,
        }
    }

    #[test]
    fn digest_sha256() {
        let provider = SoftwareProvider::new("software");
        let digest = provider.digest("SHA-256", b"hello").unwrap();
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn rsa_sign_and_verify_roundtrip() {
        let provider = SoftwareProvider::new("software");
        let mut params = alg("RSASSA-PKCS1-v1_5");
        params.modulus_length = Some(2048);
        let pair = provider.generate_key(&params, true, &["sign".into()]).unwrap();
        let GeneratedKey::Pair { public, private } = pair else {
            panic!("expected a pair");
        };
        let signature = provider.sign(&params, &private, b"hello").unwrap();
        assert!(provider.verify(&params, &public, &signature, b"hello").unwrap());

        let mut tampered = signature.clone();
        tampered[0] ^= 0xFF;
        assert!(!provider.verify(&params, &public, &tampered, b"hello").unwrap());
    }

    #[test]
    fn ecdsa_sign_and_verify_roundtrip() {
        let provider = SoftwareProvider::new("software");
        let params = alg("ECDSA");
        let pair = provider.generate_key(&params, true, &[]).unwrap();
        let GeneratedKey::Pair { public, private } = pair else {
            panic!("expected a pair");
        };
        let signature = provider.sign(&params, &private, b"data").unwrap();
        assert!(provider.verify(&params, &public, &signature, b"data").unwrap());
    }

    #[test]
    fn aes_gcm_wrap_of_derived_hmac_key() {
        let provider = SoftwareProvider::new("software");
        let kek_params = alg("AES-GCM");
        let GeneratedKey::Secret(kek) = provider.generate_key(&kek_params, true, &[]).unwrap() else {
            panic!("expected a secret key");
        };
        let hmac_params = alg("HMAC");
        let GeneratedKey::Secret(hmac_key) = provider.generate_key(&hmac_params, true, &[]).unwrap() else {
            panic!("expected a secret key");
        };

        let mut wrap_params = alg("AES-GCM");
        wrap_params.iv = Some(vec![0u8; 12]);
        let exported = provider.export_key("raw", &hmac_key).unwrap();
        let wrapped = provider.encrypt(&wrap_params, &kek, &exported).unwrap();
        let unwrapped_bytes = provider.decrypt(&wrap_params, &kek, &wrapped).unwrap();
        let unwrapped = provider.import_key("raw", &unwrapped_bytes, &hmac_params, &[]).unwrap();

        let sig_original = provider.sign(&hmac_params, &hmac_key, b"x").unwrap();
        let sig_unwrapped = provider.sign(&hmac_params, &unwrapped, b"x").unwrap();
        assert_eq!(sig_original, sig_unwrapped);
    }

    #[test]
    fn ecdh_derive_bits_agrees() {
        let provider = SoftwareProvider::new("software");
        let params = alg("ECDH");
        let GeneratedKey::Pair { public: pub_a, private: priv_a } =
            provider.generate_key(&params, true, &[]).unwrap()
        else {
            panic!("expected a pair");
        };
        let GeneratedKey::Pair { public: pub_b, private: priv_b } =
            provider.generate_key(&params, true, &[]).unwrap()
        else {
            panic!("expected a pair");
        };

        let shared_a = provider.derive_bits(&params, &priv_a, Some(&pub_b), 256).unwrap();
        let shared_b = provider.derive_bits(&params, &priv_b, Some(&pub_a), 256).unwrap();
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn jwk_round_trips_an_aes_gcm_secret_key() {
        let provider = SoftwareProvider::new("software");
        let params = alg("AES-GCM");
        let GeneratedKey::Secret(key) = provider.generate_key(&params, true, &[]).unwrap() else {
            panic!("expected a secret key");
        };
        let jwk = provider.export_key("jwk", &key).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&jwk).unwrap();
        assert_eq!(parsed["kty"], "oct");

        let imported = provider.import_key("jwk", &jwk, &params, &[]).unwrap();
        let mut wrap_params = alg("AES-GCM");
        wrap_params.iv = Some(vec![0u8; 12]);
        let ciphertext = provider.encrypt(&wrap_params, &key, b"payload").unwrap();
        let plaintext = provider.decrypt(&wrap_params, &imported, &ciphertext).unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn jwk_round_trips_an_ecdsa_key_pair() {
        let provider = SoftwareProvider::new("software");
        let params = alg("ECDSA");
        let GeneratedKey::Pair { public, private } = provider.generate_key(&params, true, &[]).unwrap() else {
            panic!("expected a pair");
        };

        let public_jwk = provider.export_key("jwk", &public).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&public_jwk).unwrap();
        assert_eq!(parsed["kty"], "EC");
        assert_eq!(parsed["crv"], "P-256");
        assert!(parsed.get("d").is_none());

        let private_jwk = provider.export_key("jwk", &private).unwrap();
        let imported_public = provider.import_key("jwk", &public_jwk, &params, &[]).unwrap();
        let imported_private = provider.import_key("jwk", &private_jwk, &params, &[]).unwrap();

        let signature = provider.sign(&params, &imported_private, b"data").unwrap();
        assert!(provider.verify(&params, &imported_public, &signature, b"data").unwrap());
    }

    #[test]
    fn jwk_round_trips_an_rsa_key_pair() {
        let provider = SoftwareProvider::new("software");
        let mut params = alg("RSASSA-PKCS1-v1_5");
        params.modulus_length = Some(2048);
        let GeneratedKey::Pair { public, private } = provider.generate_key(&params, true, &[]).unwrap() else {
            panic!("expected a pair");
        };

        let public_jwk = provider.export_key("jwk", &public).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&public_jwk).unwrap();
        assert_eq!(parsed["kty"], "RSA");
        assert!(parsed.get("d").is_none());

        let private_jwk = provider.export_key("jwk", &private).unwrap();
        let imported_public = provider.import_key("jwk", &public_jwk, &params, &[]).unwrap();
        let imported_private = provider.import_key("jwk", &private_jwk, &params, &[]).unwrap();

        let signature = provider.sign(&params, &imported_private, b"data").unwrap();
        assert!(provider.verify(&params, &imported_public, &signature, b"data").unwrap());
    }
}
