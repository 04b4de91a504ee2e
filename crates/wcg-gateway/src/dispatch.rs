//! The action dispatcher: routes one decoded [`Action`] to the provider
//! registry, handle registry, or key/cert storage, and produces either
//! an [`ActionResultData`] or a session-state transition.
//!
//! Unlike a string-switch, each family is its own small function; the
//! family tag itself (`Action::Subtle`, `Action::KeyStorage`, ...) is
//! the only place a string match happens, matching the tag-indexed
//! handler-table shape the rest of this daemon's dispatch code uses.

use base64::Engine;

use wcg_protocol::actions::{
    Action, ActionResultData, CryptoHandle, HandleKind, LoginAction, ProviderAction, ProviderInfo,
    StorageAction, SubtleAction,
};
use wcg_registry::thumbprint::{public_key_thumbprint, random_id};
use wcg_registry::{
    CertStorage, CertificateMaterial, CryptoObject, GeneratedKey, HandleRegistry, KeyStorage,
    PrivateKeyMaterial, PublicKeyMaterial, SecretKeyMaterial, StoredCert, StoredKey,
};

use crate::auth::{authorize, AuthPrompt};
use crate::error::GatewayError;
use crate::state::GatewayState;

/// What handling an action should do to the owning session, beyond
/// producing a reply payload.
pub enum DispatchOutcome {
    Data(ActionResultData),
    Authorized,
}

/// Route `action`. `is_authorized` gates everything but the
/// `Provider`/`Login`/`IsLoggedIn` families, which are available in
/// `open-unauth` too.
pub async fn dispatch(
    state: &GatewayState,
    handles: &HandleRegistry,
    is_authorized: bool,
    auth_prompt: &dyn AuthPrompt,
    action: Action,
) -> Result<DispatchOutcome, GatewayError> {
    match action {
        Action::Provider(p) => dispatch_provider(state, p).map(DispatchOutcome::Data),
        Action::Login(login) => dispatch_login(auth_prompt, login).await,
        Action::IsLoggedIn => Ok(DispatchOutcome::Data(ActionResultData::Bool(is_authorized))),
        _ if !is_authorized => Err(GatewayError::NotAuthorized),
        Action::Subtle(s) => dispatch_subtle(state, handles, s).map(DispatchOutcome::Data),
        Action::KeyStorage(s) => dispatch_key_storage(state, handles, s).await.map(DispatchOutcome::Data),
        Action::CertStorage(s) => dispatch_cert_storage(state, handles, s).await.map(DispatchOutcome::Data),
    }
}

fn dispatch_provider(state: &GatewayState, action: ProviderAction) -> Result<ActionResultData, GatewayError> {
    match action {
        ProviderAction::List => {
            let providers = state
                .provider_registry
                .list()
                .into_iter()
                .map(|p| ProviderInfo { id: p.id, name: p.name, is_hardware: p.is_hardware })
                .collect();
            Ok(ActionResultData::Providers(providers))
        }
        ProviderAction::GetCrypto { provider_id } => {
            state.provider_registry.get(&provider_id)?;
            Ok(ActionResultData::None)
        }
    }
}

async fn dispatch_login(auth_prompt: &dyn AuthPrompt, login: LoginAction) -> Result<DispatchOutcome, GatewayError> {
    if authorize(auth_prompt, login.timeout_ms).await? {
        Ok(DispatchOutcome::Authorized)
    } else {
        Err(GatewayError::NotAuthorized)
    }
}

fn dispatch_subtle(
    state: &GatewayState,
    handles: &HandleRegistry,
    action: SubtleAction,
) -> Result<ActionResultData, GatewayError> {
    match action {
        SubtleAction::Digest { provider_id, algorithm, data } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let digest = provider.digest(&algorithm.name, &b64_decode(&data)?)?;
            Ok(ActionResultData::Bytes(b64_encode(&digest)))
        }

        SubtleAction::GenerateKey { provider_id, algorithm, extractable, key_usages } => {
            let provider = state.provider_registry.get(&provider_id)?;
            match provider.generate_key(&algorithm, extractable, &key_usages.0)? {
                GeneratedKey::Pair { public, private } => {
                    let id = assign_id(&public)?;
                    let public_handle = CryptoHandle { id: id.clone(), provider_id: provider_id.clone(), kind: HandleKind::PublicKey };
                    let private_handle = CryptoHandle { id, provider_id, kind: HandleKind::PrivateKey };
                    handles.insert(public_handle.clone(), public);
                    handles.insert(private_handle.clone(), private);
                    Ok(ActionResultData::Handles(vec![public_handle, private_handle]))
                }
                GeneratedKey::Secret(object) => {
                    let id = assign_id(&object)?;
                    let handle = CryptoHandle { id, provider_id, kind: HandleKind::SecretKey };
                    handles.insert(handle.clone(), object);
                    Ok(ActionResultData::Handle(handle))
                }
            }
        }

        SubtleAction::Sign { provider_id, algorithm, key, data } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let object = resolve(handles, &key)?;
            let signature = provider.sign(&algorithm, &object, &b64_decode(&data)?)?;
            Ok(ActionResultData::Bytes(b64_encode(&signature)))
        }

        SubtleAction::Verify { provider_id, algorithm, key, signature, data } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let object = resolve(handles, &key)?;
            let ok = provider.verify(&algorithm, &object, &b64_decode(&signature)?, &b64_decode(&data)?)?;
            Ok(ActionResultData::Bytes(b64_encode(&[u8::from(ok)])))
        }

        SubtleAction::Encrypt { provider_id, algorithm, key, data } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let object = resolve(handles, &key)?;
            let ciphertext = provider.encrypt(&algorithm, &object, &b64_decode(&data)?)?;
            Ok(ActionResultData::Bytes(b64_encode(&ciphertext)))
        }

        SubtleAction::Decrypt { provider_id, algorithm, key, data } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let object = resolve(handles, &key)?;
            let plaintext = provider.decrypt(&algorithm, &object, &b64_decode(&data)?)?;
            Ok(ActionResultData::Bytes(b64_encode(&plaintext)))
        }

        SubtleAction::DeriveBits { provider_id, algorithm, base_key, length } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let base_object = resolve(handles, &base_key)?;
            let peer_object = resolve_peer_public(handles, &algorithm)?;
            let bits = provider.derive_bits(&algorithm, &base_object, peer_object.as_ref(), length)?;
            Ok(ActionResultData::Bytes(b64_encode(&bits)))
        }

        SubtleAction::DeriveKey {
            provider_id,
            algorithm,
            base_key,
            derived_key_algorithm,
            extractable: _,
            key_usages,
        } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let base_object = resolve(handles, &base_key)?;
            let peer_object = resolve_peer_public(handles, &algorithm)?;
            let length = derived_key_algorithm.length.unwrap_or(256);
            let bits = provider.derive_bits(&algorithm, &base_object, peer_object.as_ref(), length)?;
            let derived = provider.import_key("raw", &bits, &derived_key_algorithm, &key_usages.0)?;
            let id = assign_id(&derived)?;
            let handle = CryptoHandle { id, provider_id, kind: derived.kind() };
            handles.insert(handle.clone(), derived);
            Ok(ActionResultData::Handle(handle))
        }

        SubtleAction::ImportKey { provider_id, format, key_data, algorithm, extractable: _, key_usages } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let object = provider.import_key(&format, &b64_decode(&key_data)?, &algorithm, &key_usages.0)?;
            let id = assign_id(&object)?;
            let handle = CryptoHandle { id, provider_id, kind: object.kind() };
            handles.insert(handle.clone(), object);
            Ok(ActionResultData::Handle(handle))
        }

        SubtleAction::ExportKey { provider_id, format, key } => {
            let provider = state.provider_registry.get(&provider_id)?;
            let object = resolve(handles, &key)?;
            let bytes = provider.export_key(&format, &object)?;
            Ok(ActionResultData::Bytes(b64_encode(&bytes)))
        }

        SubtleAction::WrapKey { provider_id, format, key, wrapping_key, wrap_algorithm } => {
            let key_object = resolve(handles, &key)?;
            let wrapping_object = resolve(handles, &wrapping_key)?;
            let wrapped = state
                .provider_registry
                .wrap_key(&provider_id, &format, &key_object, &wrapping_object, &wrap_algorithm)?;
            Ok(ActionResultData::Bytes(b64_encode(&wrapped)))
        }

        SubtleAction::UnwrapKey {
            provider_id,
            format,
            wrapped_key,
            unwrapping_key,
            unwrap_algorithm,
            unwrapped_key_algorithm,
            extractable: _,
            key_usages,
        } => {
            let unwrapping_object = resolve(handles, &unwrapping_key)?;
            let object = state.provider_registry.unwrap_key(
                &provider_id,
                &format,
                &b64_decode(&wrapped_key)?,
                &unwrapping_object,
                &unwrap_algorithm,
                &unwrapped_key_algorithm,
                &key_usages.0,
            )?;
            let id = assign_id(&object)?;
            let handle = CryptoHandle { id, provider_id, kind: object.kind() };
            handles.insert(handle.clone(), object);
            Ok(ActionResultData::Handle(handle))
        }
    }
}

async fn dispatch_key_storage(
    state: &GatewayState,
    handles: &HandleRegistry,
    action: StorageAction,
) -> Result<ActionResultData, GatewayError> {
    match action {
        StorageAction::GetItem { provider_id, name, key_usages } => {
            let stored = state
                .key_storage
                .get_item(&name)
                .await?
                .ok_or_else(|| GatewayError::InvalidRequest(format!("Cannot get key by identity '{name}'")))?;
            let provider = state.provider_registry.get(&provider_id)?;
            // The caller's usages win when given; otherwise fall back to
            // what the key was stored with.
            let usages = key_usages.map_or_else(|| stored.usages.clone(), |u| u.0);
            let object = provider.import_key(&stored.format, &stored.data, &stored.algorithm, &usages)?;
            let id = assign_id(&object)?;
            let handle = CryptoHandle { id, provider_id, kind: object.kind() };
            handles.insert(handle.clone(), object);
            Ok(ActionResultData::Handle(handle))
        }
        StorageAction::SetItem { provider_id, name: _, handle } => {
            let object = resolve(handles, &handle)?;
            let provider = state.provider_registry.get(&provider_id)?;
            let format = export_format_for(&object)?;
            let data = provider.export_key(format, &object)?;
            let stored = StoredKey {
                format: format.to_string(),
                data,
                algorithm: algorithm_params_for(&object)?,
                extractable: true,
                usages: Vec::new(),
            };
            let index = state.key_storage.set_item(stored).await?;
            Ok(ActionResultData::Bytes(index))
        }
        StorageAction::RemoveItem { provider_id: _, name } => {
            state.key_storage.remove_item(&name).await?;
            Ok(ActionResultData::None)
        }
        StorageAction::Clear { provider_id: _ } => {
            state.key_storage.clear().await?;
            Ok(ActionResultData::None)
        }
        StorageAction::Keys { provider_id: _ } => Ok(ActionResultData::Names(state.key_storage.keys().await?)),
    }
}

async fn dispatch_cert_storage(
    state: &GatewayState,
    handles: &HandleRegistry,
    action: StorageAction,
) -> Result<ActionResultData, GatewayError> {
    match action {
        StorageAction::GetItem { provider_id, name, key_usages } => {
            let stored = state
                .cert_storage
                .get_item(&name)
                .await?
                .ok_or_else(|| GatewayError::InvalidRequest(format!("Cannot get key by identity '{name}'")))?;
            let provider = state.provider_registry.get(&provider_id)?;
            let usages = key_usages.map(|u| u.0).unwrap_or_default();
            let public_object =
                provider.import_key(&stored.public_key_format, &stored.public_key_data, &stored.public_key_algorithm, &usages)?;
            let Some(public_material) = public_object.as_public().cloned() else {
                return Err(GatewayError::InvalidRequest(
                    "stored certificate's public key did not import as a public key".to_string(),
                ));
            };
            let id = public_key_thumbprint(&public_material)?;
            let public_handle = CryptoHandle { id: id.clone(), provider_id: provider_id.clone(), kind: HandleKind::PublicKey };
            let cert_handle = CryptoHandle { id, provider_id, kind: HandleKind::Certificate };
            handles.insert(public_handle, public_object);
            handles.insert(
                cert_handle.clone(),
                CryptoObject::Certificate(CertificateMaterial { der: stored.der, public_key: public_material }),
            );
            Ok(ActionResultData::Handle(cert_handle))
        }
        StorageAction::SetItem { provider_id, name: _, handle } => {
            let object = resolve(handles, &handle)?;
            let CryptoObject::Certificate(material) = &object else {
                return Err(GatewayError::InvalidRequest("SetItem on CertStorage requires a certificate handle".to_string()));
            };
            let provider = state.provider_registry.get(&provider_id)?;
            let public_key_data = provider.export_key("spki", &CryptoObject::Public(material.public_key.clone()))?;
            let stored = StoredCert {
                cert_type: "X.509".to_string(),
                der: material.der.clone(),
                public_key_format: "spki".to_string(),
                public_key_data,
                public_key_algorithm: algorithm_params_for(&CryptoObject::Public(material.public_key.clone()))?,
            };
            let index = state.cert_storage.set_item(stored).await?;
            Ok(ActionResultData::Bytes(index))
        }
        StorageAction::RemoveItem { provider_id: _, name } => {
            state.cert_storage.remove_item(&name).await?;
            Ok(ActionResultData::None)
        }
        StorageAction::Clear { provider_id: _ } => {
            state.cert_storage.clear().await?;
            Ok(ActionResultData::None)
        }
        StorageAction::Keys { provider_id: _ } => Ok(ActionResultData::Names(state.cert_storage.keys().await?)),
    }
}

fn resolve(handles: &HandleRegistry, handle: &CryptoHandle) -> Result<CryptoObject, GatewayError> {
    Ok(handles.lookup(handle)?.object.clone())
}

fn resolve_peer_public(
    handles: &HandleRegistry,
    algorithm: &wcg_protocol::actions::AlgorithmParams,
) -> Result<Option<CryptoObject>, GatewayError> {
    match &algorithm.public_handle {
        Some(handle) => Ok(Some(resolve(handles, handle)?)),
        None => Ok(None),
    }
}

/// Public keys get the canonical SPKI thumbprint; everything else gets
/// 32 random bytes. A generated keypair's private half is assigned the
/// same id as its public half by its caller, not by this function.
fn assign_id(object: &CryptoObject) -> Result<String, GatewayError> {
    match object.as_public() {
        Some(material) => Ok(public_key_thumbprint(material)?),
        None => Ok(random_id()),
    }
}

fn export_format_for(object: &CryptoObject) -> Result<&'static str, GatewayError> {
    match object {
        CryptoObject::Public(_) => Ok("spki"),
        CryptoObject::Private(_) => Ok("pkcs8"),
        CryptoObject::Secret(_) => Ok("raw"),
        CryptoObject::Certificate(_) => Err(GatewayError::InvalidRequest("cannot store a certificate as a key".to_string())),
    }
}

/// A best-effort algorithm descriptor for a live object whose original
/// `GenerateKey`/`ImportKey` parameters were not retained — storage only
/// needs enough to re-`import_key` the bytes later.
fn algorithm_params_for(object: &CryptoObject) -> Result<wcg_protocol::actions::AlgorithmParams, GatewayError> {
    let name = match object {
        CryptoObject::Public(PublicKeyMaterial::Rsa(_)) | CryptoObject::Private(PrivateKeyMaterial::Rsa(_)) => {
            "RSASSA-PKCS1-v1_5"
        }
        CryptoObject::Public(PublicKeyMaterial::EcdsaP256(_)) | CryptoObject::Private(PrivateKeyMaterial::EcdsaP256(_)) => "ECDSA",
        CryptoObject::Public(PublicKeyMaterial::EcdhP256(_)) | CryptoObject::Private(PrivateKeyMaterial::EcdhP256(_)) => "ECDH",
        CryptoObject::Secret(SecretKeyMaterial::AesGcm256(_)) => "AES-GCM",
        CryptoObject::Secret(SecretKeyMaterial::HmacSha256(_)) => "HMAC",
        CryptoObject::Certificate(_) => {
            return Err(GatewayError::InvalidRequest("certificates have no key algorithm".to_string()))
        }
    };
    Ok(minimal_algorithm(name))
}

fn minimal_algorithm(name: &str) -> wcg_protocol::actions::AlgorithmParams {
    wcg_protocol::actions::AlgorithmParams {
        name: name.to_string(),
        hash: None,
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
    }
}

fn b64_decode(s: &str) -> Result<Vec<u8>, GatewayError> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid base64: {e}")))
}

fn b64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wcg_crypto::store::{MemoryIdentityStore, MemoryPreKeyStore, MemoryRemoteIdentityStore, MemorySessionStore};
    use wcg_protocol::actions::KeyUsages;

    use crate::auth::AutoApprove;

    use super::*;

    async fn test_state() -> GatewayState {
        GatewayState::load_or_init(
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(MemoryRemoteIdentityStore::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryPreKeyStore::new()),
        )
        .await
        .unwrap()
    }

    fn aes_algorithm() -> wcg_protocol::actions::AlgorithmParams {
        minimal_algorithm("AES-GCM")
    }

    async fn dispatch_ok(
        state: &GatewayState,
        handles: &HandleRegistry,
        is_authorized: bool,
        action: Action,
    ) -> ActionResultData {
        match dispatch(state, handles, is_authorized, &AutoApprove, action).await.unwrap() {
            DispatchOutcome::Data(data) => data,
            DispatchOutcome::Authorized => panic!("expected a data outcome"),
        }
    }

    #[tokio::test]
    async fn unauthenticated_session_rejects_subtle_actions() {
        let state = test_state().await;
        let handles = HandleRegistry::new();
        let action = Action::Subtle(SubtleAction::Digest {
            provider_id: "software".to_string(),
            algorithm: minimal_algorithm("SHA-256"),
            data: b64_encode(b"hello"),
        });
        let err = dispatch(&state, &handles, false, &AutoApprove, action).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotAuthorized));
    }

    #[tokio::test]
    async fn provider_and_login_actions_are_available_before_auth() {
        let state = test_state().await;
        let handles = HandleRegistry::new();

        let data = dispatch_ok(&state, &handles, false, Action::Provider(ProviderAction::List)).await;
        assert!(matches!(data, ActionResultData::Providers(providers) if providers.len() == 1));

        let outcome = dispatch(&state, &handles, false, &AutoApprove, Action::Login(LoginAction { timeout_ms: None }))
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Authorized));
    }

    #[tokio::test]
    async fn is_logged_in_is_available_while_unauthorized_and_reports_the_flag() {
        let state = test_state().await;
        let handles = HandleRegistry::new();
        let data = dispatch_ok(&state, &handles, false, Action::IsLoggedIn).await;
        assert!(matches!(data, ActionResultData::Bool(false)));

        let data = dispatch_ok(&state, &handles, true, Action::IsLoggedIn).await;
        assert!(matches!(data, ActionResultData::Bool(true)));
    }

    #[tokio::test]
    async fn generate_key_pair_shares_one_id_across_both_handles() {
        let state = test_state().await;
        let handles = HandleRegistry::new();
        let action = Action::Subtle(SubtleAction::GenerateKey {
            provider_id: "software".to_string(),
            algorithm: minimal_algorithm("ECDSA"),
            extractable: true,
            key_usages: KeyUsages(vec!["sign".to_string(), "verify".to_string()]),
        });
        let data = dispatch_ok(&state, &handles, true, action).await;
        let ActionResultData::Handles(pair) = data else { panic!("expected a handle pair") };
        assert_eq!(pair.len(), 2);
        assert_eq!(pair[0].id, pair[1].id);
        assert_eq!(pair[0].kind, HandleKind::PublicKey);
        assert_eq!(pair[1].kind, HandleKind::PrivateKey);
        assert_eq!(handles.len(), 2);
    }

    #[tokio::test]
    async fn key_storage_round_trips_through_set_and_get_item() {
        let state = test_state().await;
        let handles = HandleRegistry::new();

        let generated = dispatch_ok(
            &state,
            &handles,
            true,
            Action::Subtle(SubtleAction::GenerateKey {
                provider_id: "software".to_string(),
                algorithm: aes_algorithm(),
                extractable: true,
                key_usages: KeyUsages(vec!["encrypt".to_string(), "decrypt".to_string()]),
            }),
        )
        .await;
        let ActionResultData::Handle(secret_handle) = generated else { panic!("expected a single handle") };

        let set = dispatch_ok(
            &state,
            &handles,
            true,
            Action::KeyStorage(StorageAction::SetItem {
                provider_id: "software".to_string(),
                name: "my-key".to_string(),
                handle: secret_handle,
            }),
        )
        .await;
        let ActionResultData::Bytes(index) = set else { panic!("expected a storage index") };

        let fetched = dispatch_ok(
            &state,
            &handles,
            true,
            Action::KeyStorage(StorageAction::GetItem {
                provider_id: "software".to_string(),
                name: index,
                key_usages: None,
            }),
        )
        .await;
        assert!(matches!(fetched, ActionResultData::Handle(_)));
    }

    #[tokio::test]
    async fn key_storage_get_item_prefers_caller_supplied_usages() {
        let state = test_state().await;
        let stored = StoredKey {
            format: "raw".to_string(),
            data: vec![0u8; 32],
            algorithm: aes_algorithm(),
            extractable: true,
            usages: vec!["decrypt".to_string()],
        };
        let index = state.key_storage.set_item(stored).await.unwrap();

        let handles = HandleRegistry::new();
        let data = dispatch_ok(
            &state,
            &handles,
            true,
            Action::KeyStorage(StorageAction::GetItem {
                provider_id: "software".to_string(),
                name: index,
                key_usages: Some(KeyUsages(vec!["encrypt".to_string()])),
            }),
        )
        .await;
        assert!(matches!(data, ActionResultData::Handle(_)));
    }

    #[tokio::test]
    async fn key_storage_clear_does_not_touch_cert_storage() {
        let state = test_state().await;
        state
            .key_storage
            .set_item(StoredKey {
                format: "raw".to_string(),
                data: vec![0u8; 32],
                algorithm: aes_algorithm(),
                extractable: true,
                usages: Vec::new(),
            })
            .await
            .unwrap();
        state
            .cert_storage
            .set_item(StoredCert {
                cert_type: "X.509".to_string(),
                der: vec![1, 2, 3],
                public_key_format: "spki".to_string(),
                public_key_data: Vec::new(),
                public_key_algorithm: minimal_algorithm("ECDSA"),
            })
            .await
            .unwrap();

        let handles = HandleRegistry::new();
        dispatch_ok(&state, &handles, true, Action::KeyStorage(StorageAction::Clear { provider_id: "software".to_string() })).await;
        assert!(state.key_storage.keys().await.unwrap().is_empty());
        assert_eq!(state.cert_storage.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cert_storage_get_item_inserts_both_public_key_and_certificate_handles() {
        let state = test_state().await;
        let handles = HandleRegistry::new();

        let generated = dispatch_ok(
            &state,
            &handles,
            true,
            Action::Subtle(SubtleAction::GenerateKey {
                provider_id: "software".to_string(),
                algorithm: minimal_algorithm("ECDSA"),
                extractable: true,
                key_usages: KeyUsages(vec!["sign".to_string(), "verify".to_string()]),
            }),
        )
        .await;
        let ActionResultData::Handles(pair) = generated else { panic!("expected a handle pair") };
        let public_handle = pair[0].clone();

        let public_object = resolve(&handles, &public_handle).unwrap();
        let PublicKeyMaterial::EcdsaP256(_) = public_object.as_public().unwrap() else {
            panic!("expected an ECDSA public key")
        };
        let stored = StoredCert {
            cert_type: "X.509".to_string(),
            der: vec![1, 2, 3],
            public_key_format: "spki".to_string(),
            public_key_data: state.provider_registry.get("software").unwrap().export_key("spki", &public_object).unwrap(),
            public_key_algorithm: minimal_algorithm("ECDSA"),
        };
        let index = state.cert_storage.set_item(stored).await.unwrap();

        let before = handles.len();
        let fetched = dispatch_ok(
            &state,
            &handles,
            true,
            Action::CertStorage(StorageAction::GetItem {
                provider_id: "software".to_string(),
                name: index,
                key_usages: None,
            }),
        )
        .await;
        assert!(matches!(fetched, ActionResultData::Handle(_)));
        assert_eq!(handles.len(), before + 2);
    }
}
