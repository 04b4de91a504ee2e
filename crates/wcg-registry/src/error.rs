use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Cannot get CryptoItem by ID '{0}'")]
    HandleNotFound(String),

    #[error("Cannot get key by identity '{0}'")]
    KeyNotFound(String),

    #[error("provider '{0}' not found")]
    ProviderNotFound(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key usage for this operation")]
    InvalidUsage,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    Sign(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("derive failed: {0}")]
    Derive(String),

    #[error("import failed: {0}")]
    Import(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("invalid handle kind for this operation")]
    WrongHandleKind,
}
