//! Cipher trait for swappable authenticated encryption backends.

use crate::error::VaultError;

/// Nonce length shared by every supported backend (96 bits).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Output of a single AEAD encryption: the fresh nonce and `ciphertext || tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Trait for authenticated encryption with associated data (AEAD).
///
/// Implementations can be swapped without changing the codec. Every
/// implementation draws a fresh random nonce per call; nonces are never
/// accepted from the caller on the encrypt path.
pub trait Cipher: Send + Sync {
    /// Stable name, matching the `vault.cipher` config value.
    fn name(&self) -> &'static str;

    /// Encrypt `plaintext` with `key` and `aad` under a freshly generated nonce.
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Sealed, VaultError>;

    /// Decrypt `ciphertext || tag` produced by [`encrypt`](Self::encrypt).
    ///
    /// Any authentication failure maps to [`VaultError::DecryptionFailed`].
    fn decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError>;
}

/// Fill a nonce from the thread-local CSPRNG.
pub(crate) fn random_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Runtime-selected backend, built from the `vault.cipher` config value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnyCipher {
    #[default]
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl std::str::FromStr for AnyCipher {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "chacha20-poly1305" => Ok(Self::ChaCha20Poly1305),
            other => Err(VaultError::CipherError(format!("unknown cipher: {other}"))),
        }
    }
}

impl Cipher for AnyCipher {
    fn name(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => crate::aes256gcm::Aes256GcmCipher.name(),
            Self::ChaCha20Poly1305 => crate::chacha20::ChaCha20Poly1305Cipher.name(),
        }
    }

    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Sealed, VaultError> {
        match self {
            Self::Aes256Gcm => crate::aes256gcm::Aes256GcmCipher.encrypt(key, plaintext, aad),
            Self::ChaCha20Poly1305 => {
                crate::chacha20::ChaCha20Poly1305Cipher.encrypt(key, plaintext, aad)
            },
        }
    }

    fn decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        match self {
            Self::Aes256Gcm => {
                crate::aes256gcm::Aes256GcmCipher.decrypt(key, nonce, ciphertext, aad)
            },
            Self::ChaCha20Poly1305 => {
                crate::chacha20::ChaCha20Poly1305Cipher.decrypt(key, nonce, ciphertext, aad)
            },
        }
    }
}
