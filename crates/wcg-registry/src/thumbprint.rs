//! Handle-id computation.
//!
//! Public keys get a stable id: the hex-SHA-256 of their canonical SPKI
//! DER encoding, so two providers that represent "the same" public key
//! differently (or a software re-import of a token-resident key) agree
//! on its identity. Private and secret keys have no such canonical form
//! worth computing — the gateway assigns them 32 random bytes instead,
//! and gives a generated pair's private half the same id as its public
//! half at generation time (see `Provider::generate_key` callers).

use p256::pkcs8::EncodePublicKey;
use rand::RngCore;
use rsa::pkcs8::EncodePublicKey as RsaEncodePublicKey;
use sha2::{Digest, Sha256};

use crate::error::RegistryError;
use crate::object::PublicKeyMaterial;

/// Hex-SHA-256 of the key's canonical SPKI DER encoding.
pub fn public_key_thumbprint(key: &PublicKeyMaterial) -> Result<String, RegistryError> {
    let spki = match key {
        PublicKeyMaterial::Rsa(k) => k
            .to_public_key_der()
            .map_err(|e| RegistryError::Export(format!("RSA SPKI export: {e}")))?
            .into_vec(),
        PublicKeyMaterial::EcdsaP256(k) => k
            .to_public_key_der()
            .map_err(|e| RegistryError::Export(format!("P-256 SPKI export: {e}")))?
            .into_vec(),
        PublicKeyMaterial::EcdhP256(k) => k
            .to_public_key_der()
            .map_err(|e| RegistryError::Export(format!("P-256 SPKI export: {e}")))?
            .into_vec(),
    };
    Ok(hex::encode(Sha256::digest(&spki)))
}

/// 32 random bytes, hex-encoded — used as the id for private/secret keys
/// that are not themselves the public half of a pair.
pub fn random_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;

    #[test]
    fn same_key_same_thumbprint() {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = p256::ecdsa::VerifyingKey::from(&signing_key);
        let a = public_key_thumbprint(&PublicKeyMaterial::EcdsaP256(verifying_key)).unwrap();
        let b = public_key_thumbprint(&PublicKeyMaterial::EcdsaP256(verifying_key)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(random_id(), random_id());
    }
}
