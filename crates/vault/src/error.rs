//! Vault error types.

/// Errors produced by vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No active key for the caller's identity; synchronize first.
    #[error("encryption key unavailable")]
    KeyUnavailable,

    /// Authenticated decryption failed (wrong key, tampered or corrupted envelope).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The persisted key value for an identity is malformed.
    #[error("key store entry for {identity} is corrupted: {reason}")]
    KeyStoreCorrupted { identity: String, reason: String },

    /// Canonical encode / decode of a plaintext record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identities must be non-empty opaque ids.
    #[error("invalid identity")]
    InvalidIdentity,

    /// The AEAD backend refused to encrypt.
    #[error("cipher error: {0}")]
    CipherError(String),

    /// Reading or writing the device-local key store failed.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Generic error wrapper.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    #[must_use]
    pub fn decryption_failed(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed(reason.into())
    }

    #[must_use]
    pub fn key_store(message: impl std::fmt::Display) -> Self {
        Self::KeyStore(message.to_string())
    }

    /// Whether this failure means the record was sealed under a key we do not hold.
    #[must_use]
    pub fn is_key_problem(&self) -> bool {
        matches!(self, Self::KeyUnavailable | Self::DecryptionFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
