//! Secret material handling.
//!
//! Two newtypes carry every secret in the core: [`Password`] for
//! caller-supplied password material and [`DataKey`] for 256-bit data
//! encryption keys. Both overwrite their backing storage on every exit
//! path, redact themselves from debug output, and never convert to an
//! ordinary text string.

use secrecy::{ExposeSecret, SecretBox};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::KEY_SIZE;
use crate::error::{Result, VaultError};

/// Caller-supplied password material.
///
/// Distinct from a text string: the backing buffer is zeroized when the
/// value is dropped, `Debug` prints a redaction marker, and there is no
/// structural equality. Comparison happens only through key derivation.
pub struct Password {
    inner: SecretBox<Vec<u8>>,
}

impl Password {
    /// Wraps raw password bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { inner: SecretBox::new(Box::new(bytes)) }
    }

    /// Copies password material out of a borrowed slice.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    /// Consumes a `String`, zeroizing the source buffer after the copy.
    pub fn from_string(mut s: String) -> Self {
        let password = Self::new(s.as_bytes().to_vec());
        s.zeroize();
        password
    }

    /// Borrows the password bytes for key derivation.
    ///
    /// The reference must not outlive the derivation call that consumes it.
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Length of the password in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Whether the password is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// A 256-bit symmetric data-encryption key.
///
/// Lives in memory only for the duration of a session and is owned
/// exclusively by the scope that unwrapped it. The key bytes are
/// overwritten when the value is dropped, on every exit path.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_SIZE]);

impl DataKey {
    /// Generates a fresh key from the system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the random source fails.
    pub fn generate() -> Result<Self> {
        let bytes = crate::codec::random_bytes::<KEY_SIZE>()?;
        Ok(Self(bytes))
    }

    /// Wraps existing key bytes, taking ownership of them.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Reconstructs a key from a decrypted slice, zeroizing the source.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CorruptStore`] if the slice is not exactly
    /// [`KEY_SIZE`] bytes.
    pub fn from_plaintext(mut plaintext: Vec<u8>) -> Result<Self> {
        if plaintext.len() != KEY_SIZE {
            plaintext.zeroize();
            return Err(VaultError::CorruptStore);
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();
        Ok(Self(bytes))
    }

    /// Borrows the raw key bytes.
    #[must_use]
    pub fn expose(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Constant-time equality against another key.
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}
