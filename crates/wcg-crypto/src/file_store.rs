//! File-backed store implementations: the OS-file-backed variant, as
//! opposed to the in-memory stores used for tests and ephemeral hosts.
//!
//! Each store owns one sub-directory under its base path and writes one
//! file per key, via a write-to-temp-then-rename so a crash mid-write
//! never leaves a half-written file behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::CryptoError;
use crate::identity::RemoteIdentity;
use crate::store::{IdentityStore, PreKeyStore, RemoteIdentityStore, SessionStore, StoredIdentity};

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CryptoError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CryptoError::StorageError(e.to_string()))?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, data)
        .await
        .map_err(|e| CryptoError::StorageError(e.to_string()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| CryptoError::StorageError(e.to_string()))
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CryptoError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CryptoError::StorageError(e.to_string())),
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// File-backed identity store; the identity lives at `<base>/identity.bin`.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join("identity.bin"),
        }
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn load_identity(&self) -> Result<Option<StoredIdentity>, CryptoError> {
        match read_optional(&self.path).await? {
            Some(bytes) => {
                let identity = bincode::deserialize(&bytes)
                    .map_err(|e| CryptoError::StorageError(e.to_string()))?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    async fn save_identity(&self, identity: &StoredIdentity) -> Result<(), CryptoError> {
        let bytes =
            bincode::serialize(identity).map_err(|e| CryptoError::StorageError(e.to_string()))?;
        write_atomic(&self.path, &bytes).await
    }
}

/// File-backed remote identity store; one file per peer address under
/// `<base>/remote/`.
pub struct FileRemoteIdentityStore {
    dir: PathBuf,
}

impl FileRemoteIdentityStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: base_dir.into().join("remote"),
        }
    }

    fn path_for(&self, address: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", sanitize(address)))
    }
}

#[async_trait]
impl RemoteIdentityStore for FileRemoteIdentityStore {
    async fn load_remote_identity(
        &self,
        address: &str,
    ) -> Result<Option<RemoteIdentity>, CryptoError> {
        match read_optional(&self.path_for(address)).await? {
            Some(bytes) => {
                let identity = bincode::deserialize(&bytes)
                    .map_err(|e| CryptoError::StorageError(e.to_string()))?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    async fn save_remote_identity(&self, identity: &RemoteIdentity) -> Result<(), CryptoError> {
        let bytes =
            bincode::serialize(identity).map_err(|e| CryptoError::StorageError(e.to_string()))?;
        write_atomic(&self.path_for(&identity.address), &bytes).await
    }
}

/// File-backed session store; one file per peer address under
/// `<base>/sessions/`.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: base_dir.into().join("sessions"),
        }
    }

    fn path_for(&self, address: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", sanitize(address)))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_session(&self, address: &str) -> Result<Option<Vec<u8>>, CryptoError> {
        read_optional(&self.path_for(address)).await
    }

    async fn save_session(&self, address: &str, session_data: &[u8]) -> Result<(), CryptoError> {
        write_atomic(&self.path_for(address), session_data).await
    }

    async fn has_session(&self, address: &str) -> Result<bool, CryptoError> {
        Ok(tokio::fs::try_exists(self.path_for(address))
            .await
            .map_err(|e| CryptoError::StorageError(e.to_string()))?)
    }

    async fn delete_session(&self, address: &str) -> Result<(), CryptoError> {
        match tokio::fs::remove_file(self.path_for(address)).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CryptoError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(CryptoError::StorageError(e.to_string())),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CryptoError::StorageError(e.to_string()))?
        {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }
}

/// File-backed prekey store; one-time prekeys under `<base>/prekeys/`,
/// signed prekeys under `<base>/signed_prekeys/`.
pub struct FilePreKeyStore {
    prekey_dir: PathBuf,
    signed_prekey_dir: PathBuf,
}

impl FilePreKeyStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        Self {
            prekey_dir: base.join("prekeys"),
            signed_prekey_dir: base.join("signed_prekeys"),
        }
    }
}

#[async_trait]
impl PreKeyStore for FilePreKeyStore {
    async fn load_prekey(&self, prekey_id: u32) -> Result<Option<[u8; 32]>, CryptoError> {
        load_key_file(&self.prekey_dir.join(format!("{prekey_id}.bin"))).await
    }

    async fn store_prekey(&self, prekey_id: u32, secret: &[u8; 32]) -> Result<(), CryptoError> {
        write_atomic(&self.prekey_dir.join(format!("{prekey_id}.bin")), secret).await
    }

    async fn remove_prekey(&self, prekey_id: u32) -> Result<(), CryptoError> {
        match tokio::fs::remove_file(self.prekey_dir.join(format!("{prekey_id}.bin"))).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    async fn load_signed_prekey(
        &self,
        signed_prekey_id: u32,
    ) -> Result<Option<[u8; 32]>, CryptoError> {
        load_key_file(&self.signed_prekey_dir.join(format!("{signed_prekey_id}.bin"))).await
    }

    async fn store_signed_prekey(
        &self,
        signed_prekey_id: u32,
        secret: &[u8; 32],
    ) -> Result<(), CryptoError> {
        write_atomic(
            &self.signed_prekey_dir.join(format!("{signed_prekey_id}.bin")),
            secret,
        )
        .await
    }
}

async fn load_key_file(path: &Path) -> Result<Option<[u8; 32]>, CryptoError> {
    match read_optional(path).await? {
        Some(bytes) => {
            let array: [u8; 32] = bytes
                .try_into()
                .map_err(|_| CryptoError::StorageError("corrupt key file".into()))?;
            Ok(Some(array))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_roundtrips_through_filesystem() {
        let dir = tempdir();
        let store = FileIdentityStore::new(dir.path());
        let stored = StoredIdentity {
            secret_key: [9u8; 32],
            registration_id: 7,
        };
        store.save_identity(&stored).await.unwrap();
        let loaded = store.load_identity().await.unwrap().unwrap();
        assert_eq!(loaded.secret_key, stored.secret_key);
    }

    #[tokio::test]
    async fn session_roundtrips_and_lists() {
        let dir = tempdir();
        let store = FileSessionStore::new(dir.path());
        store.save_session("peer-a", b"blob").await.unwrap();
        assert!(store.has_session("peer-a").await.unwrap());
        assert_eq!(store.list_sessions().await.unwrap(), vec!["peer-a"]);
        store.delete_session("peer-a").await.unwrap();
        assert!(!store.has_session("peer-a").await.unwrap());
    }

    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        let mut path = std::env::temp_dir();
        path.push(format!("wcg-crypto-test-{}", rand::random::<u64>()));
        TempDir(path)
    }
}
