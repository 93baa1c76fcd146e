//! On-disk format of the password store.
//!
//! A single record holding exactly three role entries plus a format
//! version byte:
//!
//! ```text
//! version(1)
//! MASTER  salt(16) ‖ kdf-params(21) ‖ frame-len(4, big-endian) ‖ frame
//! DECOY   salt(16) ‖ kdf-params(21) ‖ frame-len(4, big-endian) ‖ frame
//! PANIC   salt(16) ‖ kdf-params(21) ‖ digest(32)
//! ```
//!
//! A frame is a full AEAD frame (`nonce ‖ ciphertext ‖ tag`) wrapping one
//! data key. The PANIC entry stores only a verifier digest; no key is
//! recoverable from it.

use crate::config::{KDF_PARAMS_LEN, MAX_WRAPPED_FRAME, SALT_LEN, STORE_VERSION};
use crate::error::{Result, VaultError};
use crate::kdf::KdfParams;

/// SHA-256 output size in bytes.
pub const DIGEST_LEN: usize = 32;

/// A data key encrypted under a password-derived KEK.
#[derive(Debug, Clone)]
pub struct WrappedKey {
    /// Per-entry KDF salt, unique within the store file.
    pub salt: [u8; SALT_LEN],

    /// KDF configuration the KEK was derived with.
    pub params: KdfParams,

    /// AEAD frame wrapping the 32-byte data key.
    pub frame: Vec<u8>,
}

/// A verifier digest proving knowledge of the panic password.
#[derive(Debug, Clone)]
pub struct PanicVerifier {
    /// Per-entry KDF salt, unique within the store file.
    pub salt: [u8; SALT_LEN],

    /// KDF configuration the KEK was derived with.
    pub params: KdfParams,

    /// `SHA-256(KDF(password, salt, params))`.
    pub digest: [u8; DIGEST_LEN],
}

/// The complete persisted store: exactly three roles.
#[derive(Debug, Clone)]
pub struct StoreRecord {
    /// Wraps the vault master key.
    pub master: WrappedKey,

    /// Wraps the decoy master key.
    pub decoy: WrappedKey,

    /// Verifier-only panic credential.
    pub panic: PanicVerifier,
}

impl StoreRecord {
    /// Serializes the record, version byte first.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            1 + 2 * (SALT_LEN + KDF_PARAMS_LEN + 4 + self.master.frame.len())
                + SALT_LEN
                + KDF_PARAMS_LEN
                + DIGEST_LEN,
        );
        out.push(STORE_VERSION);

        for wrapped in [&self.master, &self.decoy] {
            out.extend_from_slice(&wrapped.salt);
            out.extend_from_slice(&wrapped.params.to_bytes());
            out.extend_from_slice(&(wrapped.frame.len() as u32).to_be_bytes());
            out.extend_from_slice(&wrapped.frame);
        }

        out.extend_from_slice(&self.panic.salt);
        out.extend_from_slice(&self.panic.params.to_bytes());
        out.extend_from_slice(&self.panic.digest);

        out
    }

    /// Parses a serialized record.
    ///
    /// # Errors
    ///
    /// [`VaultError::Malformed`] on a wrong version byte, truncation,
    /// trailing bytes, or an implausible frame length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let version = reader.take_u8()?;
        if version != STORE_VERSION {
            return Err(VaultError::malformed(format!(
                "unsupported store version {version} (expected {STORE_VERSION})"
            )));
        }

        let master = Self::read_wrapped(&mut reader)?;
        let decoy = Self::read_wrapped(&mut reader)?;

        let panic = PanicVerifier {
            salt: reader.take_array::<SALT_LEN>()?,
            params: KdfParams::from_bytes(reader.take(KDF_PARAMS_LEN)?)?,
            digest: reader.take_array::<DIGEST_LEN>()?,
        };

        reader.expect_end()?;

        Ok(Self { master, decoy, panic })
    }

    fn read_wrapped(reader: &mut Reader<'_>) -> Result<WrappedKey> {
        let salt = reader.take_array::<SALT_LEN>()?;
        let params = KdfParams::from_bytes(reader.take(KDF_PARAMS_LEN)?)?;

        let frame_len = reader.take_u32()? as usize;
        if frame_len > MAX_WRAPPED_FRAME {
            return Err(VaultError::malformed(format!(
                "wrapped frame length {frame_len} exceeds {MAX_WRAPPED_FRAME}"
            )));
        }

        let frame = reader.take(frame_len)?.to_vec();
        Ok(WrappedKey { salt, params, frame })
    }
}

/// Cursor over a serialized record.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            return Err(VaultError::malformed(format!(
                "store record truncated: need {n} more bytes, have {}",
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().expect("fixed slice")))
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        Ok(self.take(N)?.try_into().expect("fixed slice"))
    }

    fn expect_end(&self) -> Result<()> {
        if !self.bytes.is_empty() {
            return Err(VaultError::malformed(format!(
                "store record has {} trailing bytes",
                self.bytes.len()
            )));
        }
        Ok(())
    }
}
