//! Persistent storage contracts for identities, remote identities, and
//! ratchet sessions, plus in-memory implementations used for tests and
//! as the default store before a caller wires up a durable one.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::identity::RemoteIdentity;

/// The durable form of a local `Identity`: just enough to reconstruct it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub secret_key: [u8; 32],
    pub registration_id: u32,
}

/// Loads and saves the single local identity. Save/load must each be
/// atomic with respect to concurrent callers — two interleaved saves
/// must never produce a file with bytes from both.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn load_identity(&self) -> Result<Option<StoredIdentity>, CryptoError>;
    async fn save_identity(&self, identity: &StoredIdentity) -> Result<(), CryptoError>;
}

/// Loads and saves the trusted identity keys of remote peers, keyed by
/// peer address. Trust is established on first use (TOFU): once saved,
/// a `RemoteIdentity` is only overwritten by an explicit `save`.
#[async_trait]
pub trait RemoteIdentityStore: Send + Sync {
    async fn load_remote_identity(
        &self,
        address: &str,
    ) -> Result<Option<RemoteIdentity>, CryptoError>;
    async fn save_remote_identity(&self, identity: &RemoteIdentity) -> Result<(), CryptoError>;
}

/// Loads and saves opaque ratchet session state, keyed by peer address.
/// Implementations persist the session *before* acknowledging a message
/// that advanced it, so a crash between advancing the ratchet and
/// acknowledging never leaves the session store behind what the peer
/// believes was received.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, address: &str) -> Result<Option<Vec<u8>>, CryptoError>;
    async fn save_session(&self, address: &str, session_data: &[u8]) -> Result<(), CryptoError>;
    async fn has_session(&self, address: &str) -> Result<bool, CryptoError>;
    async fn delete_session(&self, address: &str) -> Result<(), CryptoError>;
    async fn list_sessions(&self) -> Result<Vec<String>, CryptoError>;
}

/// Loads, stores, and consumes our own prekey material. One-time prekeys
/// are removed once consumed by a responder handshake; the signed prekey
/// is long-lived and rotated by the caller.
#[async_trait]
pub trait PreKeyStore: Send + Sync {
    async fn load_prekey(&self, prekey_id: u32) -> Result<Option<[u8; 32]>, CryptoError>;
    async fn store_prekey(&self, prekey_id: u32, secret: &[u8; 32]) -> Result<(), CryptoError>;
    async fn remove_prekey(&self, prekey_id: u32) -> Result<(), CryptoError>;
    async fn load_signed_prekey(
        &self,
        signed_prekey_id: u32,
    ) -> Result<Option<[u8; 32]>, CryptoError>;
    async fn store_signed_prekey(
        &self,
        signed_prekey_id: u32,
        secret: &[u8; 32],
    ) -> Result<(), CryptoError>;
}

/// In-memory identity store. Data does not survive process exit; useful
/// for tests and for ephemeral/browser-local-style deployments.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identity: Mutex<Option<StoredIdentity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load_identity(&self) -> Result<Option<StoredIdentity>, CryptoError> {
        Ok(self.identity.lock().unwrap().clone())
    }

    async fn save_identity(&self, identity: &StoredIdentity) -> Result<(), CryptoError> {
        *self.identity.lock().unwrap() = Some(identity.clone());
        Ok(())
    }
}

/// In-memory remote identity store (trust-on-first-use, held in a map).
#[derive(Default)]
pub struct MemoryRemoteIdentityStore {
    trusted: Mutex<HashMap<String, RemoteIdentity>>,
}

impl MemoryRemoteIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteIdentityStore for MemoryRemoteIdentityStore {
    async fn load_remote_identity(
        &self,
        address: &str,
    ) -> Result<Option<RemoteIdentity>, CryptoError> {
        Ok(self.trusted.lock().unwrap().get(address).cloned())
    }

    async fn save_remote_identity(&self, identity: &RemoteIdentity) -> Result<(), CryptoError> {
        self.trusted
            .lock()
            .unwrap()
            .insert(identity.address.clone(), identity.clone());
        Ok(())
    }
}

/// In-memory session store keyed by peer address.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self, address: &str) -> Result<Option<Vec<u8>>, CryptoError> {
        Ok(self.sessions.lock().unwrap().get(address).cloned())
    }

    async fn save_session(&self, address: &str, session_data: &[u8]) -> Result<(), CryptoError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(address.to_string(), session_data.to_vec());
        Ok(())
    }

    async fn has_session(&self, address: &str) -> Result<bool, CryptoError> {
        Ok(self.sessions.lock().unwrap().contains_key(address))
    }

    async fn delete_session(&self, address: &str) -> Result<(), CryptoError> {
        self.sessions.lock().unwrap().remove(address);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CryptoError> {
        Ok(self.sessions.lock().unwrap().keys().cloned().collect())
    }
}

/// In-memory prekey store.
#[derive(Default)]
pub struct MemoryPreKeyStore {
    prekeys: Mutex<HashMap<u32, [u8; 32]>>,
    signed_prekeys: Mutex<HashMap<u32, [u8; 32]>>,
}

impl MemoryPreKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreKeyStore for MemoryPreKeyStore {
    async fn load_prekey(&self, prekey_id: u32) -> Result<Option<[u8; 32]>, CryptoError> {
        Ok(self.prekeys.lock().unwrap().get(&prekey_id).copied())
    }

    async fn store_prekey(&self, prekey_id: u32, secret: &[u8; 32]) -> Result<(), CryptoError> {
        self.prekeys.lock().unwrap().insert(prekey_id, *secret);
        Ok(())
    }

    async fn remove_prekey(&self, prekey_id: u32) -> Result<(), CryptoError> {
        self.prekeys.lock().unwrap().remove(&prekey_id);
        Ok(())
    }

    async fn load_signed_prekey(
        &self,
        signed_prekey_id: u32,
    ) -> Result<Option<[u8; 32]>, CryptoError> {
        Ok(self
            .signed_prekeys
            .lock()
            .unwrap()
            .get(&signed_prekey_id)
            .copied())
    }

    async fn store_signed_prekey(
        &self,
        signed_prekey_id: u32,
        secret: &[u8; 32],
    ) -> Result<(), CryptoError> {
        self.signed_prekeys
            .lock()
            .unwrap()
            .insert(signed_prekey_id, *secret);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_store_roundtrip() {
        let store = MemoryIdentityStore::new();
        assert!(store.load_identity().await.unwrap().is_none());

        let stored = StoredIdentity {
            secret_key: [7u8; 32],
            registration_id: 42,
        };
        store.save_identity(&stored).await.unwrap();
        let loaded = store.load_identity().await.unwrap().unwrap();
        assert_eq!(loaded.secret_key, stored.secret_key);
        assert_eq!(loaded.registration_id, 42);
    }

    #[tokio::test]
    async fn session_store_lifecycle() {
        let store = MemorySessionStore::new();
        assert!(!store.has_session("peer-a").await.unwrap());

        store.save_session("peer-a", b"ratchet-bytes").await.unwrap();
        assert!(store.has_session("peer-a").await.unwrap());
        assert_eq!(
            store.load_session("peer-a").await.unwrap(),
            Some(b"ratchet-bytes".to_vec())
        );

        store.delete_session("peer-a").await.unwrap();
        assert!(!store.has_session("peer-a").await.unwrap());
    }
}
