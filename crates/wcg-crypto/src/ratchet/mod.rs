//! Double Ratchet session: the forward-secret, post-compromise-secure
//! channel a session is built on top of once X3DH has agreed a root key.
//!
//! This module is the one component in the workspace that is explicitly
//! designed to be swappable: [`RatchetSession`] is the whole contract a
//! caller needs, and [`DoubleRatchetSession`] is the one implementation
//! shipped here.

mod double_ratchet;
mod x3dh;

pub use double_ratchet::DoubleRatchetSession;
pub use x3dh::{initiate_session, respond_to_session};

use crate::error::CryptoError;

/// A bidirectional, self-ratcheting encrypted channel bound to one peer.
///
/// Implementations must persist their state (via [`RatchetSession::to_bytes`]
/// through a [`crate::store::SessionStore`]) after every call that advances
/// the ratchet, before the caller acknowledges the corresponding message to
/// its own caller.
pub trait RatchetSession: Send + Sync {
    /// Encrypt `plaintext`, advancing the sending chain.
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt `ciphertext`, advancing the receiving chain.
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Serialize the current ratchet state for persistence.
    fn to_bytes(&self) -> Vec<u8>;

    /// Restore a ratchet session from previously persisted state.
    fn from_bytes(data: &[u8]) -> Result<Self, CryptoError>
    where
        Self: Sized;
}
