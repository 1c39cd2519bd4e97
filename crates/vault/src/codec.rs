//! Vault codec: records to envelopes and back, plus batch decryption.

use std::sync::Arc;

use {
    base64::Engine,
    futures::{StreamExt, stream},
    serde::{Serialize, de::DeserializeOwned},
    serde_json::Value,
    zeroize::Zeroizing,
};

use crate::{
    aes256gcm::Aes256GcmCipher,
    envelope::{EncryptedEnvelope, StoredContent},
    error::VaultError,
    key::VaultKey,
    outcome::{DecryptOutcome, Unreadable, UnreadableKind},
    traits::{Cipher, NONCE_LEN, TAG_LEN},
};

/// Default number of records decrypted in parallel by [`VaultCodec::decrypt_all`].
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Envelopes carry no associated data, so existing stored records stay readable.
const ENVELOPE_AAD: &[u8] = b"";

/// Canonical encoding of a record: JSON with sorted object keys, no whitespace.
pub fn canonical_json<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>, VaultError> {
    // `serde_json::Map` is ordered by key, so going through `Value` sorts every
    // nested object regardless of the record type's field order.
    let value = serde_json::to_value(record)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Transforms plaintext records to and from [`EncryptedEnvelope`]s.
///
/// Generic over [`Cipher`] but defaults to [`Aes256GcmCipher`]. Stateless apart
/// from the cipher, so clones are cheap and decrypts never share mutable state.
pub struct VaultCodec<C: Cipher = Aes256GcmCipher> {
    cipher: Arc<C>,
    batch_concurrency: usize,
}

impl<C: Cipher> Clone for VaultCodec<C> {
    fn clone(&self) -> Self {
        Self {
            cipher: Arc::clone(&self.cipher),
            batch_concurrency: self.batch_concurrency,
        }
    }
}

impl VaultCodec<Aes256GcmCipher> {
    /// Create a codec with the default AES-256-GCM cipher.
    pub fn new() -> Self {
        Self::with_cipher(Aes256GcmCipher)
    }
}

impl Default for VaultCodec<Aes256GcmCipher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cipher + 'static> VaultCodec<C> {
    /// Create a codec with a custom cipher.
    pub fn with_cipher(cipher: C) -> Self {
        Self {
            cipher: Arc::new(cipher),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    /// Bound the number of in-flight decrypts in [`decrypt_all`](Self::decrypt_all).
    #[must_use]
    pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }

    pub fn cipher_name(&self) -> &'static str {
        self.cipher.name()
    }

    /// Encrypt `record` under `key` with a fresh nonce.
    pub fn encrypt<T: Serialize + ?Sized>(
        &self,
        record: &T,
        key: &VaultKey,
    ) -> Result<EncryptedEnvelope, VaultError> {
        let plaintext = Zeroizing::new(canonical_json(record)?);
        let sealed = self
            .cipher
            .encrypt(key.as_bytes(), &plaintext, ENVELOPE_AAD)?;

        let engine = &base64::engine::general_purpose::STANDARD;
        Ok(EncryptedEnvelope::new(
            engine.encode(sealed.nonce),
            engine.encode(&sealed.ciphertext),
        ))
    }

    /// Decrypt `envelope` with `key` and decode the record.
    ///
    /// Malformed fields and authentication failures are both
    /// [`VaultError::DecryptionFailed`]; no plaintext escapes on failure.
    pub fn decrypt<T: DeserializeOwned>(
        &self,
        envelope: &EncryptedEnvelope,
        key: &VaultKey,
    ) -> Result<T, VaultError> {
        let engine = &base64::engine::general_purpose::STANDARD;

        let iv = engine
            .decode(&envelope.iv)
            .map_err(|e| VaultError::decryption_failed(format!("iv is not base64: {e}")))?;
        let nonce: [u8; NONCE_LEN] = iv.as_slice().try_into().map_err(|_| {
            VaultError::decryption_failed(format!(
                "iv has wrong length: {} (expected {NONCE_LEN})",
                iv.len()
            ))
        })?;

        let ciphertext = engine
            .decode(&envelope.data)
            .map_err(|e| VaultError::decryption_failed(format!("data is not base64: {e}")))?;
        if ciphertext.len() < TAG_LEN {
            return Err(VaultError::decryption_failed("data too short"));
        }

        let plaintext = Zeroizing::new(self.cipher.decrypt(
            key.as_bytes(),
            &nonce,
            &ciphertext,
            ENVELOPE_AAD,
        )?);
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Recover the record behind stored content.
    ///
    /// Legacy content is returned unchanged and needs no key.
    pub fn open(&self, content: &StoredContent, key: Option<&VaultKey>) -> Result<Value, VaultError> {
        match content {
            StoredContent::Legacy(value) => Ok(value.clone()),
            StoredContent::Encrypted(envelope) => {
                let key = key.ok_or(VaultError::KeyUnavailable)?;
                self.decrypt(envelope, key)
            },
        }
    }

    /// Decrypt a batch of stored records independently.
    ///
    /// Returns one outcome per input, in input order. Entries that already
    /// failed classification and records that fail to decrypt become
    /// [`DecryptOutcome::Unreadable`]; the batch itself never fails.
    pub async fn decrypt_all(
        &self,
        contents: Vec<Result<StoredContent, VaultError>>,
        key: Option<Arc<VaultKey>>,
    ) -> Vec<DecryptOutcome> {
        let outcomes: Vec<DecryptOutcome> = stream::iter(contents.into_iter().enumerate())
            .map(|(index, content)| {
                let codec = self.clone();
                let key = key.clone();
                async move {
                    let envelope = match content {
                        Ok(StoredContent::Legacy(value)) => {
                            return DecryptOutcome::Decrypted { record: value };
                        },
                        Ok(StoredContent::Encrypted(envelope)) => envelope,
                        Err(e) => return unreadable(index, &e),
                    };

                    let task = tokio::task::spawn_blocking(move || {
                        let key = key.ok_or(VaultError::KeyUnavailable)?;
                        codec.decrypt::<Value>(&envelope, &key)
                    });
                    match task.await {
                        Ok(Ok(record)) => DecryptOutcome::Decrypted { record },
                        Ok(Err(e)) => unreadable(index, &e),
                        Err(e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(index, error = %e, "decrypt task failed");
                            let _ = e;
                            DecryptOutcome::Unreadable(Unreadable {
                                kind: UnreadableKind::Corrupted,
                                reason: crate::outcome::CORRUPTED_REASON.to_string(),
                            })
                        },
                    }
                }
            })
            .buffered(self.batch_concurrency)
            .collect()
            .await;

        #[cfg(feature = "tracing")]
        {
            let unreadable = outcomes.iter().filter(|o| o.is_unreadable()).count();
            if unreadable > 0 {
                tracing::warn!(
                    total = outcomes.len(),
                    unreadable,
                    "some records could not be decrypted"
                );
            }
        }

        outcomes
    }
}

fn unreadable(index: usize, err: &VaultError) -> DecryptOutcome {
    #[cfg(feature = "tracing")]
    tracing::debug!(index, error = %err, "record unreadable");
    #[cfg(not(feature = "tracing"))]
    let _ = index;
    DecryptOutcome::Unreadable(Unreadable::from(err))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{chacha20::ChaCha20Poly1305Cipher, outcome::KEY_MISMATCH_REASON},
        serde::Deserialize,
        serde_json::json,
    };

    fn engine() -> &'static base64::engine::GeneralPurpose {
        &base64::engine::general_purpose::STANDARD
    }

    fn flip_bit(b64: &str, index: usize) -> String {
        let mut raw = engine().decode(b64).unwrap();
        raw[index] ^= 0x01;
        engine().encode(raw)
    }

    #[test]
    fn round_trip_value() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let record = json!({
            "cognome": "ROSSI",
            "nome": "MARIO",
            "tipo_documento": "Passaporto",
        });

        let envelope = codec.encrypt(&record, &key).unwrap();
        let decrypted: Value = codec.decrypt(&envelope, &key).unwrap();
        assert_eq!(decrypted, record);
    }

    #[test]
    fn round_trip_typed_record() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Document {
            numero: String,
            scadenza: Option<String>,
            pagine: u32,
        }

        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let doc = Document {
            numero: "YA1234567".into(),
            scadenza: None,
            pagine: 32,
        };

        let envelope = codec.encrypt(&doc, &key).unwrap();
        let back: Document = codec.decrypt(&envelope, &key).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn canonical_encoding_sorts_keys() {
        #[derive(Serialize)]
        struct Unsorted {
            zeta: u8,
            alpha: u8,
        }

        let bytes = canonical_json(&Unsorted { zeta: 1, alpha: 2 }).unwrap();
        assert_eq!(bytes, br#"{"alpha":2,"zeta":1}"#);

        let nested = canonical_json(&json!({ "b": { "y": 1, "x": 2 }, "a": [3] })).unwrap();
        assert_eq!(nested, br#"{"a":[3],"b":{"x":2,"y":1}}"#);
    }

    #[test]
    fn envelope_shape() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let envelope = codec.encrypt(&json!({ "a": 1 }), &key).unwrap();

        assert_eq!(engine().decode(&envelope.iv).unwrap().len(), NONCE_LEN);
        // `{"a":1}` is 7 bytes.
        assert_eq!(engine().decode(&envelope.data).unwrap().len(), 7 + TAG_LEN);
        assert_eq!(envelope.to_value()["isEncrypted"], json!(true));
    }

    #[test]
    fn same_record_gets_distinct_nonces() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let record = json!({ "nome": "MARIO" });

        let a = codec.encrypt(&record, &key).unwrap();
        let b = codec.encrypt(&record, &key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
        assert_eq!(codec.decrypt::<Value>(&a, &key).unwrap(), record);
        assert_eq!(codec.decrypt::<Value>(&b, &key).unwrap(), record);
    }

    #[test]
    fn tampered_ciphertext_detected() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let envelope = codec.encrypt(&json!({ "nome": "MARIO" }), &key).unwrap();
        let len = engine().decode(&envelope.data).unwrap().len();

        for index in [0, len / 2, len - 1] {
            let mut tampered = envelope.clone();
            tampered.data = flip_bit(&envelope.data, index);
            let result = codec.decrypt::<Value>(&tampered, &key);
            assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
        }
    }

    #[test]
    fn tampered_iv_detected() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let envelope = codec.encrypt(&json!({ "nome": "MARIO" }), &key).unwrap();

        for index in 0..NONCE_LEN {
            let mut tampered = envelope.clone();
            tampered.iv = flip_bit(&envelope.iv, index);
            let result = codec.decrypt::<Value>(&tampered, &key);
            assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
        }
    }

    #[test]
    fn wrong_key_rejected() {
        let codec = VaultCodec::new();
        let envelope = codec.encrypt(&json!({ "a": 1 }), &VaultKey::generate()).unwrap();

        let result = codec.decrypt::<Value>(&envelope, &VaultKey::generate());
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn malformed_fields_rejected() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let good = codec.encrypt(&json!({ "a": 1 }), &key).unwrap();

        let bad_b64 = EncryptedEnvelope::new("%%%".into(), good.data.clone());
        let short_iv = EncryptedEnvelope::new(engine().encode([0u8; 8]), good.data.clone());
        let short_data = EncryptedEnvelope::new(good.iv.clone(), engine().encode([0u8; 4]));

        for envelope in [bad_b64, short_iv, short_data] {
            let result = codec.decrypt::<Value>(&envelope, &key);
            assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
        }
    }

    #[test]
    fn authenticated_garbage_is_serialization_error() {
        let codec = VaultCodec::new();
        let key = VaultKey::generate();
        let sealed = Aes256GcmCipher
            .encrypt(key.as_bytes(), b"not json", ENVELOPE_AAD)
            .unwrap();
        let envelope = EncryptedEnvelope::new(
            engine().encode(sealed.nonce),
            engine().encode(&sealed.ciphertext),
        );

        let result = codec.decrypt::<Value>(&envelope, &key);
        assert!(matches!(result, Err(VaultError::Serialization(_))));
    }

    #[test]
    fn legacy_content_needs_no_key() {
        let codec = VaultCodec::new();
        let record = json!({ "cognome": "BIANCHI" });

        let opened = codec
            .open(&StoredContent::Legacy(record.clone()), None)
            .unwrap();
        assert_eq!(opened, record);
    }

    #[test]
    fn encrypted_content_without_key_is_unavailable() {
        let codec = VaultCodec::new();
        let envelope = codec.encrypt(&json!({ "a": 1 }), &VaultKey::generate()).unwrap();

        let result = codec.open(&StoredContent::Encrypted(envelope), None);
        assert!(matches!(result, Err(VaultError::KeyUnavailable)));
    }

    #[test]
    fn chacha_codec_round_trip() {
        let codec = VaultCodec::with_cipher(ChaCha20Poly1305Cipher);
        let key = VaultKey::generate();
        let envelope = codec.encrypt(&json!({ "a": 1 }), &key).unwrap();

        assert_eq!(codec.cipher_name(), "chacha20-poly1305");
        assert_eq!(codec.decrypt::<Value>(&envelope, &key).unwrap(), json!({ "a": 1 }));
        assert!(VaultCodec::new().decrypt::<Value>(&envelope, &key).is_err());
    }

    #[tokio::test]
    async fn batch_degrades_per_record() {
        let codec = VaultCodec::new().with_batch_concurrency(2);
        let current = VaultKey::generate();
        let lost = VaultKey::generate();

        let first = json!({ "n": 1 });
        let third = json!({ "n": 3 });
        let contents = vec![
            Ok(codec.encrypt(&first, &current).unwrap().into()),
            Ok(codec.encrypt(&json!({ "n": 2 }), &lost).unwrap().into()),
            Ok(codec.encrypt(&third, &current).unwrap().into()),
        ];

        let outcomes = codec.decrypt_all(contents, Some(Arc::new(current))).await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].record(), Some(&first));
        assert!(outcomes[1].is_unreadable());
        assert_eq!(outcomes[2].record(), Some(&third));
        match &outcomes[1] {
            DecryptOutcome::Unreadable(u) => assert_eq!(u.reason, KEY_MISMATCH_REASON),
            DecryptOutcome::Decrypted { .. } => panic!("expected unreadable"),
        }
    }

    #[tokio::test]
    async fn batch_preserves_order_and_mixes_legacy() {
        let codec = VaultCodec::new().with_batch_concurrency(4);
        let key = VaultKey::generate();

        let mut contents = Vec::new();
        let mut expected = Vec::new();
        for n in 0..20 {
            let record = json!({ "n": n });
            if n % 3 == 0 {
                contents.push(Ok(StoredContent::Legacy(record.clone())));
            } else {
                contents.push(Ok(codec.encrypt(&record, &key).unwrap().into()));
            }
            expected.push(record);
        }
        contents.push(Err(VaultError::decryption_failed("malformed envelope")));

        let outcomes = codec.decrypt_all(contents, Some(Arc::new(key))).await;
        assert_eq!(outcomes.len(), 21);
        for (outcome, record) in outcomes.iter().zip(&expected) {
            assert_eq!(outcome.record(), Some(record));
        }
        assert!(outcomes[20].is_unreadable());
    }

    #[tokio::test]
    async fn batch_without_key_keeps_legacy_records() {
        let codec = VaultCodec::new();
        let envelope = codec.encrypt(&json!({ "a": 1 }), &VaultKey::generate()).unwrap();
        let legacy = json!({ "b": 2 });

        let outcomes = codec
            .decrypt_all(
                vec![Ok(envelope.into()), Ok(StoredContent::Legacy(legacy.clone()))],
                None,
            )
            .await;
        assert!(outcomes[0].is_unreadable());
        assert_eq!(outcomes[1].record(), Some(&legacy));
    }

    #[tokio::test]
    async fn empty_batch() {
        let outcomes = VaultCodec::new().decrypt_all(Vec::new(), None).await;
        assert!(outcomes.is_empty());
    }
}
