//! Pre-key bundle type used to bootstrap a ratchet session (X3DH).

use serde::{Deserialize, Serialize};

/// A bundle of public keys a peer publishes so others can establish a
/// ratchet session with it asynchronously, without either side needing
/// to be online at the same time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreKeyBundle {
    /// Ed25519 identity public key.
    pub identity_key: Vec<u8>,
    /// X25519 signed prekey (public).
    pub signed_prekey: Vec<u8>,
    /// Signature over the signed prekey by the identity key.
    pub signed_prekey_signature: Vec<u8>,
    /// Optional one-time prekey (consumed on first use).
    pub one_time_prekey: Option<Vec<u8>>,
    /// Registration ID used to disambiguate reinstalled identities.
    pub registration_id: u32,
}
