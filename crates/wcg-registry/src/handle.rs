//! The crypto handle registry: an append-only table mapping opaque
//! `{id, providerId, kind}` handles to live key/certificate objects.
//!
//! PKCS#11-backed keys are non-extractable, so the provider never hands
//! back key material directly — only a handle the registry can later
//! resolve back to the live object for a subsequent operation. The
//! registry never evicts entries; its lifetime is bound to the owning
//! session.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use wcg_protocol::actions::CryptoHandle;

use crate::error::RegistryError;
use crate::object::CryptoObject;

/// One row of the handle table.
pub struct HandleEntry {
    pub handle: CryptoHandle,
    pub object: CryptoObject,
    pub created_at: u64,
}

/// Append-only table of live handles for a single connected session.
///
/// Insertions only add rows and lookups only read immutable fields, so
/// append-only semantics are sufficient to satisfy the "no torn reads"
/// requirement without a more elaborate locking scheme.
#[derive(Default)]
pub struct HandleRegistry {
    entries: RwLock<Vec<Arc<HandleEntry>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly produced object under `handle`, returning the
    /// stored entry.
    pub fn insert(&self, handle: CryptoHandle, object: CryptoObject) -> Arc<HandleEntry> {
        let entry = Arc::new(HandleEntry {
            handle,
            object,
            created_at: now_secs(),
        });
        self.entries.write().push(Arc::clone(&entry));
        entry
    }

    /// Resolve a handle to its live object. Ties among duplicate
    /// `(id, provider_id, kind)` triples are broken by insertion order —
    /// the first-inserted entry wins.
    pub fn lookup(&self, handle: &CryptoHandle) -> Result<Arc<HandleEntry>, RegistryError> {
        self.entries
            .read()
            .iter()
            .find(|entry| &entry.handle == handle)
            .cloned()
            .ok_or_else(|| RegistryError::HandleNotFound(handle.id.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::SecretKeyMaterial;
    use wcg_protocol::actions::HandleKind;

    fn handle(id: &str, kind: HandleKind) -> CryptoHandle {
        CryptoHandle {
            id: id.to_string(),
            provider_id: "software".to_string(),
            kind,
        }
    }

    #[test]
    fn insert_then_lookup_succeeds() {
        let registry = HandleRegistry::new();
        let h = handle("abc", HandleKind::SecretKey);
        registry.insert(h.clone(), CryptoObject::Secret(SecretKeyMaterial::AesGcm256([0u8; 32])));
        assert!(registry.lookup(&h).is_ok());
    }

    #[test]
    fn lookup_miss_reports_id() {
        let registry = HandleRegistry::new();
        let h = handle("missing", HandleKind::SecretKey);
        let err = registry.lookup(&h).unwrap_err();
        assert_eq!(err.to_string(), "Cannot get CryptoItem by ID 'missing'");
    }

    #[test]
    fn duplicate_triples_resolve_to_first_inserted() {
        let registry = HandleRegistry::new();
        let h = handle("dup", HandleKind::SecretKey);
        registry.insert(h.clone(), CryptoObject::Secret(SecretKeyMaterial::AesGcm256([1u8; 32])));
        registry.insert(h.clone(), CryptoObject::Secret(SecretKeyMaterial::AesGcm256([2u8; 32])));
        let resolved = registry.lookup(&h).unwrap();
        match resolved.object.as_secret().unwrap() {
            SecretKeyMaterial::AesGcm256(bytes) => assert_eq!(bytes[0], 1),
            SecretKeyMaterial::HmacSha256(_) => panic!("wrong variant"),
        }
    }
}
