use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("channel not open")]
    ChannelNotOpen,

    #[error("channel closed")]
    ChannelClosed,

    #[error("login timed out")]
    LoginTimeout,

    #[error("message send failed: {0}")]
    SendFailed(String),

    #[error("message receive failed: {0}")]
    ReceiveFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("crypto error: {0}")]
    CryptoError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<wcg_crypto::CryptoError> for ProtocolError {
    fn from(e: wcg_crypto::CryptoError) -> Self {
        Self::CryptoError(e.to_string())
    }
}

impl From<prost::EncodeError> for ProtocolError {
    fn from(e: prost::EncodeError) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<prost::DecodeError> for ProtocolError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Deserialization(e.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
