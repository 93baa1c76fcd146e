//! Authenticated encryption over byte arrays.
//!
//! The leaf primitive of the core: AES-256-GCM with a 96-bit random nonce
//! and a 128-bit tag. Every other component builds its ciphertext through
//! this module. Frame layout: `nonce(12) ‖ ciphertext ‖ tag(16)`.
//! Associated data is authenticated but not stored in the frame.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngExt;
use zeroize::Zeroize;

use crate::config::{KEY_SIZE, MIN_FRAME_SIZE, NONCE_SIZE};
use crate::error::{Result, VaultError};

/// Fills an array with bytes from the system CSPRNG.
///
/// # Errors
///
/// Returns an error if the random source fails.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    Ok(bytes)
}

/// Overwrites a buffer with zeros.
///
/// The write goes through `zeroize`, which prevents the compiler from
/// eliding it as a dead store.
pub fn zeroize_buf(buf: &mut [u8]) {
    buf.zeroize();
}

/// AES-256-GCM codec bound to a single 256-bit key.
pub struct Codec {
    aead: Aes256Gcm,
}

impl Codec {
    /// Creates a codec for the given key.
    #[must_use]
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        let aead = Aes256Gcm::new_from_slice(key).expect("valid key size");
        Self { aead }
    }

    /// Encrypts a plaintext under a fresh random nonce.
    ///
    /// The plaintext may be empty; the resulting frame is then exactly
    /// nonce plus tag. The associated data is authenticated but must be
    /// supplied again at decryption time.
    ///
    /// # Errors
    ///
    /// Fails only if the random source fails or the plaintext exceeds the
    /// AEAD length maximum.
    pub fn encrypt(&self, plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes: [u8; NONCE_SIZE] = random_bytes()?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, Payload { msg: plaintext, aad: ad })
            .map_err(|_| VaultError::malformed("plaintext exceeds aead length limit"))?;

        let mut frame = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        frame.extend_from_slice(&nonce_bytes);
        frame.extend_from_slice(&ciphertext);

        Ok(frame)
    }

    /// Decrypts a frame, verifying the tag and associated data.
    ///
    /// Never returns partial plaintext: any single-bit modification of the
    /// frame or a mismatched `ad` yields [`VaultError::Tamper`].
    ///
    /// # Errors
    ///
    /// [`VaultError::Malformed`] if the frame is shorter than nonce plus
    /// tag; [`VaultError::Tamper`] if tag verification fails.
    pub fn decrypt(&self, frame: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
        if frame.len() < MIN_FRAME_SIZE {
            return Err(VaultError::malformed(format!(
                "frame too short: need at least {MIN_FRAME_SIZE} bytes, got {}",
                frame.len()
            )));
        }

        let (nonce_bytes, ciphertext) = frame.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.aead
            .decrypt(nonce, Payload { msg: ciphertext, aad: ad })
            .map_err(|_| VaultError::Tamper)
    }
}
