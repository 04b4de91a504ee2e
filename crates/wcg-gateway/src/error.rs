use thiserror::Error;

/// Errors that can surface while servicing one action. Every variant
/// carries enough to produce a `ResultEnvelope::Err { code, message }`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("{0}")]
    Registry(#[from] wcg_registry::RegistryError),

    #[error("{0}")]
    Crypto(#[from] wcg_crypto::CryptoError),

    #[error("{0}")]
    Protocol(#[from] wcg_protocol::ProtocolError),

    #[error("not authorized for this action")]
    NotAuthorized,

    #[error("CryptoLogin timeout")]
    LoginTimeout,

    #[error("{0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// The stable machine-readable code carried in a `ResultEnvelope::Err`.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::UnknownAction(_) => "UnknownAction",
            GatewayError::Registry(_) => "RegistryError",
            GatewayError::Crypto(_) => "CryptoError",
            GatewayError::Protocol(_) => "ProtocolError",
            GatewayError::NotAuthorized => "NotAuthorized",
            GatewayError::LoginTimeout => "LoginTimeout",
            GatewayError::InvalidRequest(_) => "InvalidRequest",
        }
    }
}
