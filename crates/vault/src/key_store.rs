//! Device-local storage for per-identity key values.
//!
//! Values are opaque strings (base64 of the raw key). Nothing in this module
//! ever talks to the remote record store.

use std::{collections::HashMap, path::PathBuf};

use {async_trait::async_trait, tokio::sync::RwLock};

use crate::error::VaultError;

/// Async key-value store for key material, keyed by entry name.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<String>, VaultError>;
    async fn save(&self, name: &str, value: &str) -> Result<(), VaultError>;
    /// Remove an entry. Returns whether it existed.
    async fn remove(&self, name: &str) -> Result<bool, VaultError>;
}

/// Session-scoped store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn load(&self, name: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn save(&self, name: &str, value: &str) -> Result<(), VaultError> {
        self.entries
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, VaultError> {
        Ok(self.entries.write().await.remove(name).is_some())
    }
}

/// Device-persistent store: one JSON object file mapping entry names to values.
///
/// Written with `0600` permissions on Unix. Writes go through a temporary file
/// and a rename so a crash never leaves a half-written map behind.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_map(&self) -> Result<HashMap<String, String>, VaultError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %self.path.display(), "key store file not found");
                return Ok(HashMap::new());
            },
            Err(e) => {
                return Err(VaultError::key_store(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            },
        };

        if data.trim().is_empty() {
            return Ok(HashMap::new());
        }

        // An unparsable file is not silently discarded: other identities'
        // keys may still be recoverable by hand.
        serde_json::from_str(&data).map_err(|e| {
            VaultError::key_store(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<(), VaultError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(VaultError::key_store)?;
        }

        let data = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| VaultError::key_store(format!("failed to write {}: {e}", tmp.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(VaultError::key_store)?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| VaultError::key_store(format!("failed to replace key store: {e}")))
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn load(&self, name: &str) -> Result<Option<String>, VaultError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(name))
    }

    async fn save(&self, name: &str, value: &str) -> Result<(), VaultError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(name.to_string(), value.to_string());
        self.write_map(&map).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %self.path.display(), name, "key store entry saved");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, VaultError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(name).is_none() {
            return Ok(false);
        }
        self.write_map(&map).await?;
        Ok(true)
    }
}
