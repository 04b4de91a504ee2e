//! The plaintext discovery endpoint: `GET /.well-known/webcrypto-local`.
//!
//! Served over plain HTTP (not the secured channel) because a client
//! needs the server's pre-key bundle before it can establish a ratchet
//! session at all. The server side wires this up as an `axum` route
//! alongside the websocket upgrade; this module only carries the shared
//! type and the client-side fetch.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

pub const WELL_KNOWN_PATH: &str = "/.well-known/webcrypto-local";

/// Response body of the discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    /// Base64 of the serialized `PreKeyBundle`.
    pub pre_key: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, pre_key_bundle: &[u8]) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            pre_key: base64::engine::general_purpose::STANDARD.encode(pre_key_bundle),
        }
    }

    pub fn pre_key_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.pre_key)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Fetch `ServerInfo` from a running gateway's discovery endpoint.
pub async fn fetch_server_info(base_url: &str) -> Result<ServerInfo, ProtocolError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), WELL_KNOWN_PATH);
    let response = reqwest::get(&url)
        .await
        .map_err(|e| ProtocolError::Network(e.to_string()))?;
    if !response.status().is_success() {
        return Err(ProtocolError::Network("Cannot GET response".to_string()));
    }
    response
        .json::<ServerInfo>()
        .await
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_key_roundtrips_through_base64() {
        let info = ServerInfo::new("wcg-gateway", "0.1.0", b"bundle-bytes");
        assert_eq!(info.pre_key_bytes().unwrap(), b"bundle-bytes".to_vec());
    }
}
