//! The one plaintext frame exchanged before a ratchet session exists.
//!
//! Everything after this frame is opaque ratchet ciphertext; this frame
//! cannot be, because the responder has not yet derived the chains
//! needed to decrypt anything. It carries exactly what
//! `wcg_crypto::ratchet::respond_to_session` needs and nothing else.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Sent by the connecting client as the very first frame on a fresh
/// transport connection, before any `WireMessage` is exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeInit {
    /// The client's Ed25519 identity public key.
    pub identity_key: Vec<u8>,
    /// The X25519 ephemeral public key generated for this session.
    pub ephemeral_key: Vec<u8>,
    /// Which of the server's published one-time prekeys (if any) this
    /// handshake consumed, so the server can retire it.
    pub one_time_prekey_id: Option<u32>,
}

pub fn encode_handshake_init(init: &HandshakeInit) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(init).map_err(Into::into)
}

pub fn decode_handshake_init(bytes: &[u8]) -> Result<HandshakeInit, ProtocolError> {
    serde_json::from_slice(bytes).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_init_roundtrips() {
        let init = HandshakeInit {
            identity_key: vec![1, 2, 3],
            ephemeral_key: vec![4, 5, 6],
            one_time_prekey_id: Some(7),
        };
        let bytes = encode_handshake_init(&init).unwrap();
        let decoded = decode_handshake_init(&bytes).unwrap();
        assert_eq!(decoded.identity_key, vec![1, 2, 3]);
        assert_eq!(decoded.one_time_prekey_id, Some(7));
    }
}
