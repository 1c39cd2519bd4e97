/// Config schema types (vault, key store, database).
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Cipher names accepted by `vault.cipher`.
pub const KNOWN_CIPHERS: &[&str] = &["aes-256-gcm", "chacha20-poly1305"];

/// File name of the device key store inside the data dir.
pub const KEY_STORE_FILENAME: &str = "vault_keys.json";

/// File name of the SQLite record store inside the data dir.
pub const DATABASE_FILENAME: &str = "docscan.db";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocscanConfig {
    pub vault: VaultConfig,
    pub key_store: KeyStoreConfig,
    pub database: DatabaseConfig,
}

/// Codec settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Encryption backend. Defaults to "aes-256-gcm".
    pub cipher: String,
    /// Maximum records decrypted in parallel during a batch load.
    pub batch_concurrency: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            cipher: "aes-256-gcm".into(),
            batch_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    /// Keys live only as long as the process.
    Memory,
    /// Keys persist in a JSON file on the device.
    #[default]
    File,
}

/// Device-local key store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    pub backend: KeyStoreBackend,
    /// Key file location for the `file` backend. Defaults to
    /// `<data_dir>/vault_keys.json`.
    pub path: Option<PathBuf>,
}

impl KeyStoreConfig {
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir.join(KEY_STORE_FILENAME))
    }
}

/// Record store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL. Defaults to `sqlite://<data_dir>/docscan.db?mode=rwc`.
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_url(&self, data_dir: &Path) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}?mode=rwc",
                data_dir.join(DATABASE_FILENAME).display()
            ),
        }
    }
}
