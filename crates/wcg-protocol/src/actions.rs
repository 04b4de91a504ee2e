//! Rust-domain representation of the action/result surface carried
//! inside an [`crate::codec::ActionEnvelope`]'s `payload`/`data` bytes.
//!
//! Each [`Action`] variant's name is also its wire tag (the `action`
//! field of the outer envelope) via [`Action::tag`]; the dispatcher's
//! handler table is keyed on that same string.

use serde::{Deserialize, Serialize};

/// Which kind of object a [`CryptoHandle`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleKind {
    PublicKey,
    PrivateKey,
    SecretKey,
    Certificate,
}

/// An opaque reference to a live key or certificate object held by a
/// provider, handed to clients instead of raw key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoHandle {
    pub id: String,
    pub provider_id: String,
    pub kind: HandleKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_base64", default)]
    pub public_exponent: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modulus_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_curve: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_base64", default)]
    pub iv: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_base64", default)]
    pub additional_data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_base64", default)]
    pub salt: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_base64", default)]
    pub info: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_handle: Option<CryptoHandle>,
}

mod opt_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(d)?;
        match opt {
            Some(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyUsages(pub Vec<String>);

/// The Subtle-family parameter payloads, one per WebCrypto subtle
/// operation named in the action surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum SubtleAction {
    Digest { provider_id: String, algorithm: AlgorithmParams, data: String },
    GenerateKey {
        provider_id: String,
        algorithm: AlgorithmParams,
        extractable: bool,
        key_usages: KeyUsages,
    },
    Sign { provider_id: String, algorithm: AlgorithmParams, key: CryptoHandle, data: String },
    Verify {
        provider_id: String,
        algorithm: AlgorithmParams,
        key: CryptoHandle,
        signature: String,
        data: String,
    },
    Encrypt { provider_id: String, algorithm: AlgorithmParams, key: CryptoHandle, data: String },
    Decrypt { provider_id: String, algorithm: AlgorithmParams, key: CryptoHandle, data: String },
    DeriveBits { provider_id: String, algorithm: AlgorithmParams, base_key: CryptoHandle, length: u32 },
    DeriveKey {
        provider_id: String,
        algorithm: AlgorithmParams,
        base_key: CryptoHandle,
        derived_key_algorithm: AlgorithmParams,
        extractable: bool,
        key_usages: KeyUsages,
    },
    ImportKey {
        provider_id: String,
        format: String,
        key_data: String,
        algorithm: AlgorithmParams,
        extractable: bool,
        key_usages: KeyUsages,
    },
    ExportKey { provider_id: String, format: String, key: CryptoHandle },
    WrapKey {
        provider_id: String,
        format: String,
        key: CryptoHandle,
        wrapping_key: CryptoHandle,
        wrap_algorithm: AlgorithmParams,
    },
    UnwrapKey {
        provider_id: String,
        format: String,
        wrapped_key: String,
        unwrapping_key: CryptoHandle,
        unwrap_algorithm: AlgorithmParams,
        unwrapped_key_algorithm: AlgorithmParams,
        extractable: bool,
        key_usages: KeyUsages,
    },
}

/// The KeyStorage/CertStorage-family operations, shared between the two
/// since both expose the same get/set/remove/clear/keys contract over
/// their respective object kind. Both families are provider-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum StorageAction {
    GetItem { provider_id: String, name: String, key_usages: Option<KeyUsages> },
    SetItem { provider_id: String, name: String, handle: CryptoHandle },
    RemoveItem { provider_id: String, name: String },
    Clear { provider_id: String },
    Keys { provider_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ProviderAction {
    List,
    GetCrypto { provider_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAction {
    pub timeout_ms: Option<u64>,
}

/// The full set of action families an [`ActionEnvelope`] may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum Action {
    Provider(ProviderAction),
    Subtle(SubtleAction),
    KeyStorage(StorageAction),
    CertStorage(StorageAction),
    Login(LoginAction),
    IsLoggedIn,
}

impl Action {
    /// The wire tag used for dispatch and carried in the envelope's
    /// `action` field, e.g. `"Subtle.Digest"`, `"KeyStorage.GetItem"`.
    pub fn tag(&self) -> String {
        match self {
            Action::Provider(p) => format!("Provider.{}", variant_name(p)),
            Action::Subtle(s) => format!("Subtle.{}", variant_name(s)),
            Action::KeyStorage(s) => format!("KeyStorage.{}", variant_name(s)),
            Action::CertStorage(s) => format!("CertStorage.{}", variant_name(s)),
            Action::Login(_) => "Login".to_string(),
            Action::IsLoggedIn => "IsLoggedIn".to_string(),
        }
    }
}

fn variant_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map
            .get("op")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        _ => "Unknown".to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResultData {
    Handle(CryptoHandle),
    Handles(Vec<CryptoHandle>),
    Bytes(String),
    Names(Vec<String>),
    Providers(Vec<ProviderInfo>),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub is_hardware: bool,
}

/// An unsolicited server-to-client push. Carries no `actionId` and is
/// dispatched to listeners rather than to a pending correlated call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    Authorized,
    Token {
        added: Vec<ProviderInfo>,
        removed: Vec<ProviderInfo>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtle_digest_tag() {
        let action = Action::Subtle(SubtleAction::Digest {
            provider_id: "software".into(),
            algorithm: AlgorithmParams {
                name: "SHA-256".into(),
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
            },
            data: "aGVsbG8=".into(),
        });
        assert_eq!(action.tag(), "Subtle.Digest");
    }

    #[test]
    fn key_storage_clear_tag() {
        let action = Action::KeyStorage(StorageAction::Clear { provider_id: "software".into() });
        assert_eq!(action.tag(), "KeyStorage.Clear");
    }
}
