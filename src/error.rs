//! Error taxonomy of the vault core.
//!
//! The core never renders text to a user; it returns tagged error values
//! and leaves any mapping to user-facing messages to the enclosing
//! application. Classification failures are deliberately collapsed: the
//! distinction between a wrong password and a tampered wrapped key is
//! logged to the audit channel but never exposed in a return value.

use thiserror::Error;

/// Tagged failure values returned by every core operation.
#[derive(Debug, Error)]
pub enum VaultError {
    /// AEAD tag verification failed: the ciphertext, nonce, or associated
    /// data does not match what was authenticated at encryption time.
    #[error("authentication failed: ciphertext or associated data was modified")]
    Tamper,

    /// Structurally invalid input: a frame shorter than the minimum, wrong
    /// magic bytes, an unsupported format version, or an unparsable
    /// manifest.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// No usable key-derivation algorithm is present in this environment.
    #[error("no key derivation algorithm available")]
    KdfUnavailable,

    /// Key-derivation parameters fall outside the documented ranges.
    #[error("invalid key derivation parameters: {0}")]
    KdfParamsInvalid(String),

    /// The password store file is present but a wrapped key failed to
    /// decrypt for the correct role.
    #[error("password store is corrupt")]
    CorruptStore,

    /// The cryptographic-erasure phase of a panic did not complete. The
    /// security guarantee is not delivered until a retry succeeds.
    #[error("panic phase 1 (key destruction) failed")]
    PanicPhase1Failed,

    /// Underlying storage failure.
    #[error("i/o failure")]
    Io(#[from] std::io::Error),

    /// A caller-supplied cancellation token was honored.
    #[error("operation cancelled")]
    Cancelled,
}

impl VaultError {
    /// Shorthand for a [`VaultError::Malformed`] with a formatted message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VaultError = io.into();
        assert!(matches!(err, VaultError::Io(_)));
    }

    #[test]
    fn test_display_is_stable() {
        assert_eq!(
            VaultError::malformed("bad magic").to_string(),
            "malformed input: bad magic"
        );
        assert_eq!(
            VaultError::CorruptStore.to_string(),
            "password store is corrupt"
        );
    }
}
