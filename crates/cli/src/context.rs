//! Wires config, key store, codec and record store into one value per run.

use std::{path::Path, sync::Arc};

use {
    anyhow::Context as _,
    docscan_config::{DocscanConfig, KeyStoreBackend, Severity},
    docscan_vault::{
        AnyCipher, DocumentVault, FileKeyStore, Identity, KeyManager, KeyStore, MemoryKeyStore,
        SqliteRecordStore, VaultCodec,
    },
    tracing::{debug, warn},
};

pub struct Context {
    pub config: DocscanConfig,
    pub keys: Arc<KeyManager>,
    pub key_store: Arc<dyn KeyStore>,
    pub codec: VaultCodec<AnyCipher>,
}

impl Context {
    /// Load config from `config_path`, or discover it, and build the key side.
    ///
    /// Explicit and discovered files are validated alike.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(docscan_config::find_config_file);
        if let Some(path) = &path {
            check_config(path)?;
        }
        Self::from_config(docscan_config::load_or_default(path.as_deref())?)
    }

    pub fn from_config(config: DocscanConfig) -> anyhow::Result<Self> {
        let key_store: Arc<dyn KeyStore> = match config.key_store.backend {
            KeyStoreBackend::Memory => Arc::new(MemoryKeyStore::new()),
            KeyStoreBackend::File => {
                let path = config
                    .key_store
                    .resolved_path(&docscan_config::data_dir());
                debug!(path = %path.display(), "using file key store");
                Arc::new(FileKeyStore::new(path))
            },
        };

        let cipher: AnyCipher = config.vault.cipher.parse()?;
        let codec =
            VaultCodec::with_cipher(cipher).with_batch_concurrency(config.vault.batch_concurrency);

        Ok(Self {
            keys: Arc::new(KeyManager::new(Arc::clone(&key_store))),
            key_store,
            codec,
            config,
        })
    }

    /// Sign `identity` in: load or create its key and make it active.
    pub async fn sign_in(&self, identity: &str) -> anyhow::Result<Identity> {
        let identity = Identity::new(identity)?;
        self.keys.synchronize(&identity).await?;
        Ok(identity)
    }

    /// Open the record store and run migrations.
    pub async fn vault(&self) -> anyhow::Result<DocumentVault<AnyCipher>> {
        let data_dir = docscan_config::data_dir();
        let url = self.config.database.resolved_url(&data_dir);
        if self.config.database.url.is_none() {
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("failed to create {}", data_dir.display()))?;
        }

        let pool = sqlx::SqlitePool::connect(&url)
            .await
            .with_context(|| format!("failed to open database {url}"))?;
        docscan_vault::run_migrations(&pool).await?;

        Ok(DocumentVault::new(
            Arc::clone(&self.keys),
            self.codec.clone(),
            Arc::new(SqliteRecordStore::new(pool)),
        ))
    }
}

/// Refuse to run with a config that has errors; log the rest.
fn check_config(path: &Path) -> anyhow::Result<()> {
    let result = docscan_config::validate(Some(path));
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => {},
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => debug!(path = %d.path, "{}", d.message),
        }
    }
    if result.has_errors() {
        let errors: Vec<String> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(ToString::to_string)
            .collect();
        anyhow::bail!("invalid config {}:\n  {}", path.display(), errors.join("\n  "));
    }
    Ok(())
}
