//! The provider registry: enumerates available WebCrypto subtle-crypto
//! providers (software, and in a full deployment, PKCS#11-token-backed
//! ones) and reports their hotplug events.
//!
//! `wcg-registry` ships one concrete [`Provider`]: [`software::SoftwareProvider`].
//! PKCS#11 module loading is out of scope; a token-backed provider would
//! implement the same [`Provider`] trait and register itself the same way.

pub mod software;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use wcg_protocol::actions::AlgorithmParams;

use crate::error::RegistryError;
use crate::object::{CryptoObject, GeneratedKey};

/// Static identity of a provider, as returned by the `ProviderInfo` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCryptoInfo {
    pub id: String,
    pub name: String,
    pub is_hardware: bool,
}

/// A hotplug event: tokens that appeared or disappeared since the last
/// event. Broadcast to every `open-auth` session with a live ratchet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    pub added: Vec<ProviderCryptoInfo>,
    pub removed: Vec<ProviderCryptoInfo>,
}

/// The WebCrypto subtle-crypto surface a provider must implement.
///
/// `wrap_key`/`unwrap_key` are not part of this trait: per the WebCrypto
/// spec they decompose into export+encrypt and decrypt+import, which
/// [`ProviderRegistry`] implements generically on top of the methods
/// below so each provider only has to implement the primitives once.
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;
    fn info(&self) -> ProviderCryptoInfo;

    fn digest(&self, algorithm: &str, data: &[u8]) -> Result<Vec<u8>, RegistryError>;

    fn generate_key(
        &self,
        algorithm: &AlgorithmParams,
        extractable: bool,
        usages: &[String],
    ) -> Result<GeneratedKey, RegistryError>;

    fn sign(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        data: &[u8],
    ) -> Result<Vec<u8>, RegistryError>;

    fn verify(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool, RegistryError>;

    fn encrypt(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        data: &[u8],
    ) -> Result<Vec<u8>, RegistryError>;

    fn decrypt(
        &self,
        algorithm: &AlgorithmParams,
        key: &CryptoObject,
        data: &[u8],
    ) -> Result<Vec<u8>, RegistryError>;

    fn derive_bits(
        &self,
        algorithm: &AlgorithmParams,
        base_key: &CryptoObject,
        peer_public: Option<&CryptoObject>,
        length: u32,
    ) -> Result<Vec<u8>, RegistryError>;

    fn import_key(
        &self,
        format: &str,
        key_data: &[u8],
        algorithm: &AlgorithmParams,
        usages: &[String],
    ) -> Result<CryptoObject, RegistryError>;

    fn export_key(&self, format: &str, object: &CryptoObject) -> Result<Vec<u8>, RegistryError>;
}

/// Registry of all providers the gateway knows about, keyed by provider id.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    events: broadcast::Sender<TokenEvent>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let (events, _rx) = broadcast::channel(64);
        Self {
            providers: RwLock::new(HashMap::new()),
            events,
        }
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn Provider>) {
        self.providers.write().insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, provider_id: &str) -> Result<Arc<dyn Provider>, RegistryError> {
        self.providers
            .read()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound(provider_id.to_string()))
    }

    pub fn list(&self) -> Vec<ProviderCryptoInfo> {
        self.providers.read().values().map(|p| p.info()).collect()
    }

    /// Subscribe to provider hotplug events (card insert/remove).
    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.events.subscribe()
    }

    /// Publish a hotplug event. A software-only deployment never calls
    /// this in practice; it exists for a token-backed provider to drive
    /// and for tests to exercise the broadcast path.
    pub fn publish(&self, event: TokenEvent) {
        let _ = self.events.send(event);
    }

    /// `WrapKey`: export `key` in `format`, then encrypt the exported
    /// bytes under `wrapping_key` using `wrap_algorithm`.
    pub fn wrap_key(
        &self,
        provider_id: &str,
        format: &str,
        key: &CryptoObject,
        wrapping_key: &CryptoObject,
        wrap_algorithm: &AlgorithmParams,
    ) -> Result<Vec<u8>, RegistryError> {
        let provider = self.get(provider_id)?;
        let exported = provider.export_key(format, key)?;
        provider.encrypt(wrap_algorithm, wrapping_key, &exported)
    }

    /// `UnwrapKey`: decrypt `wrapped` under `unwrapping_key`, then import
    /// the recovered bytes as a new key carrying `usages`.
    pub fn unwrap_key(
        &self,
        provider_id: &str,
        format: &str,
        wrapped: &[u8],
        unwrapping_key: &CryptoObject,
        unwrap_algorithm: &AlgorithmParams,
        unwrapped_key_algorithm: &AlgorithmParams,
        usages: &[String],
    ) -> Result<CryptoObject, RegistryError> {
        let provider = self.get(provider_id)?;
        let plaintext = provider.decrypt(unwrap_algorithm, unwrapping_key, wrapped)?;
        provider.import_key(format, &plaintext, unwrapped_key_algorithm, usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::software::SoftwareProvider;

    #[test]
    fn register_and_list() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(SoftwareProvider::new("software")));
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "software");
    }

    #[test]
    fn unknown_provider_errors() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("nope").is_err());
    }

    #[tokio::test]
    async fn hotplug_event_reaches_subscriber() {
        let registry = ProviderRegistry::new();
        let mut rx = registry.subscribe();
        registry.publish(TokenEvent {
            added: vec![ProviderCryptoInfo {
                id: "t1".into(),
                name: "TEST".into(),
                is_hardware: true,
            }],
            removed: vec![],
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.added[0].id, "t1");
    }
}
