//! Stored content formats: the encrypted envelope and legacy plaintext records.
//!
//! Wire shape of an envelope, as persisted in a record's `content` column:
//!
//! ```json
//! { "iv": "<base64>", "data": "<base64>", "isEncrypted": true }
//! ```
//!
//! Anything without `isEncrypted: true` predates encryption and is the record
//! itself.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::VaultError;

/// JSON field marking an encrypted envelope.
pub const ENCRYPTED_MARKER: &str = "isEncrypted";

/// One encrypted record. Opaque to everything but [`VaultCodec`](crate::VaultCodec).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Base64 of the 96-bit nonce.
    pub iv: String,
    /// Base64 of `ciphertext || tag`.
    pub data: String,
    #[serde(deserialize_with = "marker_true")]
    is_encrypted: bool,
}

/// Accept only `true` for the marker; anything else is not an envelope.
fn marker_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match bool::deserialize(deserializer)? {
        true => Ok(true),
        false => Err(serde::de::Error::invalid_value(
            serde::de::Unexpected::Bool(false),
            &"true",
        )),
    }
}

impl EncryptedEnvelope {
    pub fn new(iv: String, data: String) -> Self {
        Self {
            iv,
            data,
            is_encrypted: true,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "iv": self.iv,
            "data": self.data,
            "isEncrypted": true,
        })
    }
}

/// Content of a stored record, classified once right after fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredContent {
    Encrypted(EncryptedEnvelope),
    Legacy(Value),
}

impl StoredContent {
    /// Classify a fetched `content` value.
    ///
    /// Only `isEncrypted: true` (the JSON boolean) selects the envelope branch.
    /// An object that claims to be encrypted but lacks string `iv`/`data`
    /// fields is rejected rather than passed through as plaintext.
    pub fn from_value(value: Value) -> Result<Self, VaultError> {
        let claims_encrypted = value
            .get(ENCRYPTED_MARKER)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !claims_encrypted {
            return Ok(Self::Legacy(value));
        }

        serde_json::from_value::<EncryptedEnvelope>(value)
            .map(Self::Encrypted)
            .map_err(|e| VaultError::decryption_failed(format!("malformed envelope: {e}")))
    }

    /// Classify raw stored text. Text that is not JSON at all is a
    /// [`VaultError::Serialization`] for that record only.
    pub fn from_json(raw: &str) -> Result<Self, VaultError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Encrypted(envelope) => envelope.to_value(),
            Self::Legacy(value) => value,
        }
    }
}

impl From<EncryptedEnvelope> for StoredContent {
    fn from(envelope: EncryptedEnvelope) -> Self {
        Self::Encrypted(envelope)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn envelope_wire_shape() {
        let envelope = EncryptedEnvelope::new("aXY=".into(), "ZGF0YQ==".into());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({ "iv": "aXY=", "data": "ZGF0YQ==", "isEncrypted": true })
        );
        assert_eq!(envelope.to_value(), value);
    }

    #[test]
    fn unparsable_text_is_serialization_error() {
        assert!(matches!(
            StoredContent::from_json("not json{"),
            Err(VaultError::Serialization(_))
        ));
        assert!(StoredContent::from_json(r#"{"cognome":"ROSSI"}"#).is_ok());
    }

    #[test]
    fn envelope_rejects_false_marker() {
        let result = serde_json::from_value::<EncryptedEnvelope>(json!({
            "iv": "aXY=",
            "data": "ZGF0YQ==",
            "isEncrypted": false,
        }));
        assert!(result.is_err());

        let missing = serde_json::from_value::<EncryptedEnvelope>(json!({
            "iv": "aXY=",
            "data": "ZGF0YQ==",
        }));
        assert!(missing.is_err());
    }

    #[test]
    fn classifies_envelope() {
        let content = StoredContent::from_value(json!({
            "iv": "aXY=",
            "data": "ZGF0YQ==",
            "isEncrypted": true,
        }))
        .unwrap();
        assert!(content.is_encrypted());
    }

    #[test]
    fn missing_marker_is_legacy() {
        let record = json!({ "cognome": "ROSSI", "nome": "MARIO" });
        let content = StoredContent::from_value(record.clone()).unwrap();
        assert_eq!(content, StoredContent::Legacy(record));
    }

    #[test]
    fn non_true_marker_is_legacy() {
        for marker in [json!(false), json!("true"), json!(1), Value::Null] {
            let record = json!({ "iv": "x", "data": "y", "isEncrypted": marker });
            let content = StoredContent::from_value(record.clone()).unwrap();
            assert_eq!(content, StoredContent::Legacy(record));
        }
    }

    #[test]
    fn non_object_is_legacy() {
        let content = StoredContent::from_value(json!(["a", "b"])).unwrap();
        assert!(!content.is_encrypted());
    }

    #[test]
    fn malformed_envelope_rejected() {
        let result = StoredContent::from_value(json!({ "isEncrypted": true, "iv": 12 }));
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn into_value_round_trips() {
        let envelope = EncryptedEnvelope::new("aXY=".into(), "ZGF0YQ==".into());
        let content = StoredContent::from(envelope.clone());
        assert_eq!(content.into_value(), envelope.to_value());
    }
}
