//! Live crypto objects held in the [`crate::handle::HandleRegistry`].
//!
//! PKCS#11-backed keys cannot be exported from the token, so the gateway
//! keeps the actual key material resident in process memory and only ever
//! hands callers an opaque [`wcg_protocol::actions::CryptoHandle`] that
//! refers back to one of these.

use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p256::{PublicKey as P256PublicKey, SecretKey as P256SecretKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use wcg_protocol::actions::HandleKind;

/// A public key, independent of which algorithm family it belongs to.
#[derive(Clone)]
pub enum PublicKeyMaterial {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdhP256(P256PublicKey),
}

/// A private key, independent of which algorithm family it belongs to.
#[derive(Clone)]
pub enum PrivateKeyMaterial {
    Rsa(RsaPrivateKey),
    EcdsaP256(P256SigningKey),
    EcdhP256(P256SecretKey),
}

/// A symmetric key, independent of which algorithm it is used with.
#[derive(Clone)]
pub enum SecretKeyMaterial {
    AesGcm256([u8; 32]),
    HmacSha256([u8; 32]),
}

/// A parsed X.509 certificate together with the public key it certifies.
#[derive(Clone)]
pub struct CertificateMaterial {
    pub der: Vec<u8>,
    pub public_key: PublicKeyMaterial,
}

/// Every kind of object the handle registry can hold.
#[derive(Clone)]
pub enum CryptoObject {
    Public(PublicKeyMaterial),
    Private(PrivateKeyMaterial),
    Secret(SecretKeyMaterial),
    Certificate(CertificateMaterial),
}

impl CryptoObject {
    pub fn kind(&self) -> HandleKind {
        match self {
            CryptoObject::Public(_) => HandleKind::PublicKey,
            CryptoObject::Private(_) => HandleKind::PrivateKey,
            CryptoObject::Secret(_) => HandleKind::SecretKey,
            CryptoObject::Certificate(_) => HandleKind::Certificate,
        }
    }

    pub fn as_public(&self) -> Option<&PublicKeyMaterial> {
        match self {
            CryptoObject::Public(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_private(&self) -> Option<&PrivateKeyMaterial> {
        match self {
            CryptoObject::Private(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_secret(&self) -> Option<&SecretKeyMaterial> {
        match self {
            CryptoObject::Secret(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_certificate(&self) -> Option<&CertificateMaterial> {
        match self {
            CryptoObject::Certificate(c) => Some(c),
            _ => None,
        }
    }
}

/// The outcome of a key-generating operation: either a keypair (whose
/// handles will share the same thumbprint `id`, differing only in
/// `kind`) or a single symmetric key.
pub enum GeneratedKey {
    Pair {
        public: CryptoObject,
        private: CryptoObject,
    },
    Secret(CryptoObject),
}
