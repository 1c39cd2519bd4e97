//! ChaCha20-Poly1305 implementation of the [`Cipher`] trait.
//!
//! Selected with `vault.cipher = "chacha20-poly1305"` on devices without AES
//! hardware acceleration. Envelopes do not record the backend, so every device
//! sharing records must be configured identically.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{
    error::VaultError,
    traits::{Cipher, NONCE_LEN, Sealed, random_nonce},
};

/// ChaCha20-Poly1305 AEAD cipher with a 96-bit nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaCha20Poly1305Cipher;

impl Cipher for ChaCha20Poly1305Cipher {
    fn name(&self) -> &'static str {
        "chacha20-poly1305"
    }

    #[allow(deprecated)]
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Sealed, VaultError> {
        let cipher = ChaCha20Poly1305::new(key.into());
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
        let cipher = ChaCha20Poly1305::new(key.into());

        cipher
            .decrypt(Nonce::from_slice(nonce), Payload {
                msg: ciphertext,
                aad,
            })
            .map_err(|_| VaultError::decryption_failed("authentication tag mismatch"))
    }
}
