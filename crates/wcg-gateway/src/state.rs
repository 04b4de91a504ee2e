//! Shared daemon state: the local identity, persisted key-agreement
//! material, and the provider/storage surface every connected session
//! dispatches against.

use std::sync::Arc;

use rand::rngs::OsRng;
use tracing::info;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use wcg_crypto::store::{IdentityStore, PreKeyStore, RemoteIdentityStore, SessionStore, StoredIdentity};
use wcg_crypto::{CryptoError, Identity, PreKeyBundle};
use wcg_registry::provider::software::SoftwareProvider;
use wcg_registry::{CertStorage, KeyStorage, MemoryCertStorage, MemoryKeyStorage, ProviderRegistry};

/// The signed-prekey id this daemon always publishes under. A real
/// multi-prekey deployment would rotate through several; one is enough
/// for a single-user local gateway.
const SIGNED_PREKEY_ID: u32 = 1;

/// Everything a connected session needs to authenticate peers, persist
/// ratchet state, and service subtle-crypto actions.
pub struct GatewayState {
    pub identity: Identity,
    pub identity_store: Arc<dyn IdentityStore>,
    pub remote_identity_store: Arc<dyn RemoteIdentityStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub prekey_store: Arc<dyn PreKeyStore>,
    pub pre_key_bundle: PreKeyBundle,
    pub provider_registry: Arc<ProviderRegistry>,
    pub key_storage: Arc<dyn KeyStorage>,
    pub cert_storage: Arc<dyn CertStorage>,
}

impl GatewayState {
    /// Load (or generate and persist) the local identity and signed
    /// prekey, build a `PreKeyBundle` from them, and register the
    /// software provider.
    pub async fn load_or_init(
        identity_store: Arc<dyn IdentityStore>,
        remote_identity_store: Arc<dyn RemoteIdentityStore>,
        session_store: Arc<dyn SessionStore>,
        prekey_store: Arc<dyn PreKeyStore>,
    ) -> Result<Self, CryptoError> {
        let identity = match identity_store.load_identity().await? {
            Some(stored) => {
                info!("loaded existing identity");
                Identity::from_secret_bytes(&stored.secret_key)
            }
            None => {
                info!("generating new identity");
                let identity = Identity::generate();
                identity_store
                    .save_identity(&StoredIdentity {
                        secret_key: *identity.secret_key_bytes(),
                        registration_id: rand::random(),
                    })
                    .await?;
                identity
            }
        };

        let signed_prekey_secret = match prekey_store.load_signed_prekey(SIGNED_PREKEY_ID).await? {
            Some(secret) => secret,
            None => {
                let secret = StaticSecret::random_from_rng(OsRng).to_bytes();
                prekey_store.store_signed_prekey(SIGNED_PREKEY_ID, &secret).await?;
                secret
            }
        };
        let signed_prekey_public = X25519Public::from(&StaticSecret::from(signed_prekey_secret));
        let signature = identity.sign(signed_prekey_public.as_bytes());

        let pre_key_bundle = PreKeyBundle {
            identity_key: identity.public_key_bytes().to_vec(),
            signed_prekey: signed_prekey_public.as_bytes().to_vec(),
            signed_prekey_signature: signature.to_bytes().to_vec(),
            one_time_prekey: None,
            registration_id: 1,
        };

        let provider_registry = Arc::new(ProviderRegistry::new());
        provider_registry.register(Arc::new(SoftwareProvider::new("software")));

        Ok(Self {
            identity,
            identity_store,
            remote_identity_store,
            session_store,
            prekey_store,
            pre_key_bundle,
            provider_registry,
            key_storage: Arc::new(MemoryKeyStorage::new()),
            cert_storage: Arc::new(MemoryCertStorage::new()),
        })
    }

    /// The signed prekey's secret bytes, needed to respond to a fresh
    /// handshake. Always present once `load_or_init` has run.
    pub async fn signed_prekey_secret(&self) -> Result<[u8; 32], CryptoError> {
        self.prekey_store
            .load_signed_prekey(SIGNED_PREKEY_ID)
            .await?
            .ok_or_else(|| CryptoError::PreKeyError("signed prekey missing after init".to_string()))
    }
}
