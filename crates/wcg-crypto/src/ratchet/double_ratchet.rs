use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::CryptoError;
use crate::ratchet::RatchetSession;

/// Symmetric ratchet state established by an X3DH handshake.
///
/// Each call to `encrypt`/`decrypt` derives a fresh message key from the
/// relevant chain key via HKDF and advances that chain, giving forward
/// secrecy message-by-message. This is a symmetric-chain-only ratchet
/// rather than a full DH-ratchet-per-message design — enough to exercise
/// the session/store/dispatcher contracts this crate is responsible for
/// without reimplementing Signal's protocol end to end.
#[derive(Clone, Serialize, Deserialize)]
pub struct DoubleRatchetSession {
    root_key: [u8; 32],
    sending_chain_key: [u8; 32],
    receiving_chain_key: [u8; 32],
    send_counter: u64,
    recv_counter: u64,
}

impl DoubleRatchetSession {
    pub(crate) fn new(
        root_key: [u8; 32],
        sending_chain_key: [u8; 32],
        receiving_chain_key: [u8; 32],
    ) -> Self {
        Self {
            root_key,
            sending_chain_key,
            receiving_chain_key,
            send_counter: 0,
            recv_counter: 0,
        }
    }

    pub fn send_counter(&self) -> u64 {
        self.send_counter
    }

    pub fn recv_counter(&self) -> u64 {
        self.recv_counter
    }
}

fn derive_step(chain_key: &[u8; 32]) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, chain_key);
    let mut message_key = [0u8; 32];
    let mut next_chain_key = [0u8; 32];
    hk.expand(b"wcg-ratchet-msg-key", &mut message_key)
        .map_err(|e| CryptoError::EncryptionError(format!("HKDF: {e}")))?;
    hk.expand(b"wcg-ratchet-chain-key", &mut next_chain_key)
        .map_err(|e| CryptoError::EncryptionError(format!("HKDF: {e}")))?;
    Ok((message_key, next_chain_key))
}

impl RatchetSession for DoubleRatchetSession {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (message_key, next_chain_key) = derive_step(&self.sending_chain_key)?;
        self.sending_chain_key = next_chain_key;
        self.send_counter += 1;

        let cipher = Aes256Gcm::new_from_slice(&message_key)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let mut nonce_bytes = [0u8; 12];
        nonce_bytes[4..].copy_from_slice(&self.send_counter.to_le_bytes());
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let mut output = Vec::with_capacity(8 + ciphertext.len());
        output.extend_from_slice(&self.send_counter.to_le_bytes());
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < 8 {
            return Err(CryptoError::DecryptionError("message too short".into()));
        }
        let counter = u64::from_le_bytes(
            ciphertext[..8]
                .try_into()
                .map_err(|_| CryptoError::DecryptionError("invalid counter".into()))?,
        );
        let body = &ciphertext[8..];

        let (message_key, next_chain_key) = derive_step(&self.receiving_chain_key)?;
        self.receiving_chain_key = next_chain_key;
        self.recv_counter += 1;

        let cipher = Aes256Gcm::new_from_slice(&message_key)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;

        let mut nonce_bytes = [0u8; 12];
        nonce_bytes[4..].copy_from_slice(&counter.to_le_bytes());
        let nonce = Nonce::from_slice(&nonce_bytes);

        cipher
            .decrypt(nonce, body)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))
    }

    fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("ratchet state serialization is infallible")
    }

    fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        bincode::deserialize(data).map_err(|e| CryptoError::SessionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paired_sessions() -> (DoubleRatchetSession, DoubleRatchetSession) {
        let root = [1u8; 32];
        let chain_a = [2u8; 32];
        let chain_b = [3u8; 32];
        let initiator = DoubleRatchetSession::new(root, chain_a, chain_b);
        let responder = DoubleRatchetSession::new(root, chain_b, chain_a);
        (initiator, responder)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let (mut initiator, mut responder) = paired_sessions();
        let ciphertext = initiator.encrypt(b"hello").unwrap();
        let plaintext = responder.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn chain_advances_each_message() {
        let (mut initiator, mut responder) = paired_sessions();
        let c1 = initiator.encrypt(b"one").unwrap();
        let c2 = initiator.encrypt(b"two").unwrap();
        assert_ne!(c1, c2);
        assert_eq!(responder.decrypt(&c1).unwrap(), b"one");
        assert_eq!(responder.decrypt(&c2).unwrap(), b"two");
    }

    #[test]
    fn serialization_roundtrip_preserves_state() {
        let (mut initiator, _) = paired_sessions();
        initiator.encrypt(b"advance").unwrap();
        let bytes = initiator.to_bytes();
        let restored = DoubleRatchetSession::from_bytes(&bytes).unwrap();
        assert_eq!(restored.send_counter(), initiator.send_counter());
    }
}
