//! Persistence facade: encrypts before every write, decrypts after every read.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    aes256gcm::Aes256GcmCipher,
    codec::VaultCodec,
    envelope::StoredContent,
    error::VaultError,
    key::Identity,
    key_manager::KeyManager,
    outcome::DecryptOutcome,
    store::{RecordId, RecordStore},
    traits::Cipher,
};

/// One stored document as seen by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub created_at: u64,
    pub updated_at: u64,
    /// Whether the stored form is an encrypted envelope.
    pub encrypted: bool,
    #[serde(flatten)]
    pub outcome: DecryptOutcome,
}

/// Ties the [`KeyManager`], the [`VaultCodec`] and a [`RecordStore`] together.
///
/// Writes require the caller's identity to hold the active key; there is no
/// plaintext fallback.
pub struct DocumentVault<C: Cipher = Aes256GcmCipher> {
    keys: Arc<KeyManager>,
    codec: VaultCodec<C>,
    store: Arc<dyn RecordStore>,
}

impl<C: Cipher + 'static> DocumentVault<C> {
    pub fn new(keys: Arc<KeyManager>, codec: VaultCodec<C>, store: Arc<dyn RecordStore>) -> Self {
        Self { keys, codec, store }
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn codec(&self) -> &VaultCodec<C> {
        &self.codec
    }

    /// Encrypt `record` and insert it for `identity`.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        identity: &Identity,
        record: &T,
    ) -> Result<RecordId, VaultError> {
        let key = self.keys.active_key_for(identity).await?;
        let envelope = self.codec.encrypt(record, &key)?;
        let id = self
            .store
            .insert(identity.as_str(), &envelope.to_value())
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(identity = %identity, id, "document saved");
        Ok(id)
    }

    /// Re-encrypt `record` under a fresh nonce and replace record `id`.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        identity: &Identity,
        id: RecordId,
        record: &T,
    ) -> Result<bool, VaultError> {
        let key = self.keys.active_key_for(identity).await?;
        let envelope = self.codec.encrypt(record, &key)?;
        self.store.update(id, &envelope.to_value()).await
    }

    /// Fetch and decrypt every document owned by `identity`.
    ///
    /// Never fails because of an individual record: records sealed under a
    /// lost key, or with malformed envelopes, come back as
    /// [`DecryptOutcome::Unreadable`] so they can be shown and deleted.
    pub async fn load_all(&self, identity: &Identity) -> Result<Vec<Document>, VaultError> {
        let rows = self.store.fetch_all(identity.as_str()).await?;
        let key = self.keys.active_key_for(identity).await.ok();

        let mut headers = Vec::with_capacity(rows.len());
        let mut contents = Vec::with_capacity(rows.len());
        for row in rows {
            let content = StoredContent::from_json(&row.content);
            let encrypted = !matches!(content, Ok(StoredContent::Legacy(_)));
            headers.push((row.id, row.created_at, row.updated_at, encrypted));
            contents.push(content);
        }

        let outcomes = self.codec.decrypt_all(contents, key).await;
        Ok(headers
            .into_iter()
            .zip(outcomes)
            .map(|((id, created_at, updated_at, encrypted), outcome)| Document {
                id,
                created_at,
                updated_at,
                encrypted,
                outcome,
            })
            .collect())
    }

    pub async fn delete(&self, id: RecordId) -> Result<bool, VaultError> {
        self.store.delete_by_id(id).await
    }

    pub async fn delete_many(&self, ids: &[RecordId]) -> Result<u64, VaultError> {
        self.store.delete_by_ids(ids).await
    }

    /// Encrypt every legacy plaintext record owned by `identity` in place.
    ///
    /// Returns the number of records migrated. Running it again is a no-op.
    pub async fn migrate_legacy(&self, identity: &Identity) -> Result<usize, VaultError> {
        let key = self.keys.active_key_for(identity).await?;
        let rows = self.store.fetch_all(identity.as_str()).await?;

        let mut count = 0;
        for row in rows {
            let record = match StoredContent::from_json(&row.content) {
                Ok(StoredContent::Legacy(record)) => record,
                // Malformed rows are left untouched for manual deletion.
                Ok(StoredContent::Encrypted(_)) | Err(_) => continue,
            };

            let envelope = self.codec.encrypt(&record, &key)?;
            if self.store.update(row.id, &envelope.to_value()).await? {
                count += 1;
            }
        }

        if count > 0 {
            #[cfg(feature = "tracing")]
            tracing::info!(identity = %identity, count, "migrated legacy documents to encrypted storage");
        }

        Ok(count)
    }
}
