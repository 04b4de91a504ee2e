//! Key and certificate storage: durable, provider-scoped object stores
//! addressed by a caller-chosen string index rather than a handle.
//!
//! Unlike the [`crate::handle::HandleRegistry`] (session-scoped, holds
//! live objects), storage holds exportable key/certificate *material* so
//! it can outlive a connection; `GetItem` reconstructs a live object via
//! [`crate::provider::Provider::import_key`] and hands back a fresh
//! handle.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use wcg_protocol::actions::AlgorithmParams;

use crate::error::RegistryError;

/// A stored key, in exportable form.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredKey {
    pub format: String,
    pub data: Vec<u8>,
    pub algorithm: AlgorithmParams,
    pub extractable: bool,
    pub usages: Vec<String>,
}

/// A stored certificate, plus enough of its public key to reinsert it
/// into the handle registry on retrieval.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredCert {
    pub cert_type: String,
    pub der: Vec<u8>,
    pub public_key_format: String,
    pub public_key_data: Vec<u8>,
    pub public_key_algorithm: AlgorithmParams,
}

#[async_trait]
pub trait KeyStorage: Send + Sync {
    async fn get_item(&self, index: &str) -> Result<Option<StoredKey>, RegistryError>;
    async fn set_item(&self, key: StoredKey) -> Result<String, RegistryError>;
    async fn remove_item(&self, index: &str) -> Result<(), RegistryError>;
    async fn keys(&self) -> Result<Vec<String>, RegistryError>;
    async fn clear(&self) -> Result<(), RegistryError>;
}

#[async_trait]
pub trait CertStorage: Send + Sync {
    async fn get_item(&self, index: &str) -> Result<Option<StoredCert>, RegistryError>;
    async fn set_item(&self, cert: StoredCert) -> Result<String, RegistryError>;
    async fn remove_item(&self, index: &str) -> Result<(), RegistryError>;
    async fn keys(&self) -> Result<Vec<String>, RegistryError>;
    async fn clear(&self) -> Result<(), RegistryError>;
}

/// In-memory key storage, indexed by a counter-derived string. Good
/// enough for a session that hasn't been handed a durable backing store.
#[derive(Default)]
pub struct MemoryKeyStorage {
    items: Mutex<HashMap<String, StoredKey>>,
    next_index: Mutex<u64>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> String {
        let mut n = self.next_index.lock();
        *n += 1;
        format!("key-{n}")
    }
}

#[async_trait]
impl KeyStorage for MemoryKeyStorage {
    async fn get_item(&self, index: &str) -> Result<Option<StoredKey>, RegistryError> {
        Ok(self.items.lock().get(index).cloned())
    }

    async fn set_item(&self, key: StoredKey) -> Result<String, RegistryError> {
        let index = self.next();
        self.items.lock().insert(index.clone(), key);
        Ok(index)
    }

    async fn remove_item(&self, index: &str) -> Result<(), RegistryError> {
        self.items.lock().remove(index);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.items.lock().keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), RegistryError> {
        self.items.lock().clear();
        Ok(())
    }
}

/// In-memory certificate storage, same shape as [`MemoryKeyStorage`].
#[derive(Default)]
pub struct MemoryCertStorage {
    items: Mutex<HashMap<String, StoredCert>>,
    next_index: Mutex<u64>,
}

impl MemoryCertStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> String {
        let mut n = self.next_index.lock();
        *n += 1;
        format!("cert-{n}")
    }
}

#[async_trait]
impl CertStorage for MemoryCertStorage {
    async fn get_item(&self, index: &str) -> Result<Option<StoredCert>, RegistryError> {
        Ok(self.items.lock().get(index).cloned())
    }

    async fn set_item(&self, cert: StoredCert) -> Result<String, RegistryError> {
        let index = self.next();
        self.items.lock().insert(index.clone(), cert);
        Ok(index)
    }

    async fn remove_item(&self, index: &str) -> Result<(), RegistryError> {
        self.items.lock().remove(index);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.items.lock().keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), RegistryError> {
        self.items.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> StoredKey {
        StoredKey {
            format: "raw".into(),
            data: vec![1, 2, 3],
            algorithm: AlgorithmParams {
                name: "HMAC".into(),
                hash: Some("SHA-256".into()),
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
            },
            extractable: true,
            usages: vec!["sign".into(), "verify".into()],
        }
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let storage = MemoryKeyStorage::new();
        let index = storage.set_item(sample_key()).await.unwrap();
        let fetched = storage.get_item(&index).await.unwrap().unwrap();
        assert_eq!(fetched.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn clear_empties_keys() {
        let storage = MemoryKeyStorage::new();
        storage.set_item(sample_key()).await.unwrap();
        storage.clear().await.unwrap();
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_item_deletes_single_entry() {
        let storage = MemoryKeyStorage::new();
        let index = storage.set_item(sample_key()).await.unwrap();
        storage.remove_item(&index).await.unwrap();
        assert!(storage.get_item(&index).await.unwrap().is_none());
    }
}
