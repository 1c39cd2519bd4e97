//! Key material and identity types.

use std::fmt;

use {
    base64::Engine,
    serde::{Deserialize, Serialize},
    zeroize::Zeroizing,
};

use crate::error::VaultError;

/// Length of a vault key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Authenticated user id that scopes the active key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Result<Self, VaultError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(VaultError::InvalidIdentity);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

/// A 256-bit symmetric key. Zeroized on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey(Zeroizing<[u8; KEY_LEN]>);

impl VaultKey {
    /// Generate a fresh key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes[..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encode as the key store value: base64 of the raw key bytes.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(self.0.as_ref()))
    }

    /// Decode a key store value. `identity` only labels the error.
    pub fn from_base64(identity: &Identity, encoded: &str) -> Result<Self, VaultError> {
        let corrupted = |reason: String| VaultError::KeyStoreCorrupted {
            identity: identity.to_string(),
            reason,
        };

        let raw = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| corrupted(format!("not base64: {e}")))?,
        );
        if raw.len() != KEY_LEN {
            return Err(corrupted(format!(
                "wrong key length: {} (expected {KEY_LEN})",
                raw.len()
            )));
        }

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_rejected() {
        assert!(matches!(Identity::new(""), Err(VaultError::InvalidIdentity)));
        assert!(matches!(Identity::new("   "), Err(VaultError::InvalidIdentity)));
        assert_eq!(Identity::new("user-1").unwrap().as_str(), "user-1");
    }

    #[test]
    fn base64_round_trip() {
        let id = Identity::new("user-1").unwrap();
        let key = VaultKey::generate();

        let decoded = VaultKey::from_base64(&id, &key.to_base64()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn malformed_value_is_corruption() {
        let id = Identity::new("user-1").unwrap();

        let err = VaultKey::from_base64(&id, "not base64 at all!").unwrap_err();
        assert!(matches!(err, VaultError::KeyStoreCorrupted { .. }));

        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        let err = VaultKey::from_base64(&id, &short).unwrap_err();
        assert!(matches!(err, VaultError::KeyStoreCorrupted { .. }));
    }

    #[test]
    fn debug_is_redacted() {
        let key = VaultKey::from_bytes([0xAB; KEY_LEN]);
        let printed = format!("{key:?}");
        assert_eq!(printed, "VaultKey([REDACTED])");
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(VaultKey::generate(), VaultKey::generate());
    }
}
