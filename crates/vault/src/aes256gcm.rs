//! AES-256-GCM implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{
    error::VaultError,
    traits::{Cipher, NONCE_LEN, Sealed, random_nonce},
};

/// AES-256-GCM AEAD cipher, the envelope default.
///
/// Output layout: `ciphertext || tag (16 bytes)`, nonce carried separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmCipher;

impl Cipher for Aes256GcmCipher {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    #[allow(deprecated)]
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Sealed, VaultError> {
        let cipher = Aes256Gcm::new(key.into());
        let nonce = random_nonce();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| VaultError::CipherError(e.to_string()))?;

        Ok(Sealed { nonce, ciphertext })
    }

    #[allow(deprecated)]
    fn decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        let cipher = Aes256Gcm::new(key.into());

        cipher
            .decrypt(Nonce::from_slice(nonce), Payload {
                msg: ciphertext,
                aad,
            })
            .map_err(|_| VaultError::decryption_failed("authentication tag mismatch"))
    }
}
