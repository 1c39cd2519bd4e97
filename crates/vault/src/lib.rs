//! Client-side encryption vault for scanned documents.
//!
//! Records are encrypted on the device with a per-identity 256-bit key before
//! they reach the remote store, and decrypted transparently on read. The
//! [`KeyManager`] owns the key lifecycle, the [`VaultCodec`] owns the envelope
//! format, and [`DocumentVault`] wires both to a [`RecordStore`].
//! Trait-based [`Cipher`] design allows swapping the encryption backend.

pub mod aes256gcm;
pub mod chacha20;
pub mod codec;
pub mod document;
pub mod envelope;
pub mod error;
pub mod key;
pub mod key_manager;
pub mod key_store;
pub mod outcome;
pub mod store;
pub mod traits;

pub use {
    aes256gcm::Aes256GcmCipher,
    chacha20::ChaCha20Poly1305Cipher,
    codec::{VaultCodec, canonical_json},
    document::{Document, DocumentVault},
    envelope::{EncryptedEnvelope, StoredContent},
    error::VaultError,
    key::{Identity, VaultKey},
    key_manager::{IdentityEvent, KeyManager, KeyStatus},
    key_store::{FileKeyStore, KeyStore, MemoryKeyStore},
    outcome::{DecryptOutcome, Unreadable, UnreadableKind},
    store::{RecordId, RecordStore, SqliteRecordStore, StoredRecord},
    traits::{AnyCipher, Cipher},
};

/// Run database migrations for the vault crate.
///
/// Creates the `documents` table. Should be called at application startup
/// before any [`SqliteRecordStore`] is used.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), VaultError> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
