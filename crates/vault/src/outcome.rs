//! Per-record results of a batch read.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::VaultError;

/// Reason shown for records sealed under a key this device no longer holds.
pub const KEY_MISMATCH_REASON: &str = "key mismatch or missing";

/// Reason shown for records whose plaintext could not be decoded.
pub const CORRUPTED_REASON: &str = "record could not be decoded";

/// Why a record could not be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadableKind {
    /// Wrong, reset or missing key, or a tampered envelope.
    KeyMismatch,
    /// Authenticated plaintext that is not a valid record.
    Corrupted,
}

/// Inert placeholder for a record that failed to decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unreadable {
    pub kind: UnreadableKind,
    pub reason: String,
}

impl From<&VaultError> for Unreadable {
    fn from(err: &VaultError) -> Self {
        if err.is_key_problem() {
            Self {
                kind: UnreadableKind::KeyMismatch,
                reason: KEY_MISMATCH_REASON.to_string(),
            }
        } else {
            Self {
                kind: UnreadableKind::Corrupted,
                reason: CORRUPTED_REASON.to_string(),
            }
        }
    }
}

/// Result of decrypting one stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecryptOutcome<T = Value> {
    Decrypted { record: T },
    Unreadable(Unreadable),
}

impl<T> DecryptOutcome<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Decrypted { record } => Some(record),
            Self::Unreadable(_) => None,
        }
    }

    pub fn into_record(self) -> Option<T> {
        match self {
            Self::Decrypted { record } => Some(record),
            Self::Unreadable(_) => None,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable(_))
    }
}

impl<T> From<Result<T, VaultError>> for DecryptOutcome<T> {
    fn from(result: Result<T, VaultError>) -> Self {
        match result {
            Ok(record) => Self::Decrypted { record },
            Err(e) => Self::Unreadable(Unreadable::from(&e)),
        }
    }
}
