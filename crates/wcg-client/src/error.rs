use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("the gateway closed the channel")]
    ChannelClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] wcg_protocol::ProtocolError),

    #[error("crypto error: {0}")]
    Crypto(#[from] wcg_crypto::CryptoError),

    #[error("the gateway rejected the request: {0}")]
    Remote(String),

    #[error("login timed out")]
    LoginTimeout,

    #[error("Socket connection is not open")]
    NotOpen,
}
