//! Key-derivation parameter records.
//!
//! Parameters are chosen once by the benchmark, persisted next to every
//! salt, and never upgraded silently. The serialized form is a fixed-width
//! 21-byte record stable across implementations:
//! `tag(1) ‖ memKiB(4) ‖ passes(4) ‖ parallelism(4) ‖ pbkdf2Iters(4) ‖
//! saltLen(2) ‖ outLen(2)`, integers big-endian, non-applicable fields
//! zero.

use crate::config::{
    ARGON_MEMORY, ARGON_MEMORY_CAP, ARGON_MEMORY_FLOOR, ARGON_THREADS, ARGON_THREADS_MAX,
    ARGON_TIME, ARGON_TIME_MAX, KDF_OUT_LEN, KDF_PARAMS_LEN, KDF_TAG_ARGON2ID, KDF_TAG_PBKDF2,
    PBKDF2_MAX_ITERS, PBKDF2_MIN_ITERS, SALT_LEN,
};
use crate::error::{Result, VaultError};

/// Password-hashing algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfAlgorithm {
    /// Memory-hard primary algorithm.
    Argon2id,

    /// Fallback for environments without Argon2id support.
    Pbkdf2HmacSha512,
}

impl KdfAlgorithm {
    fn tag(self) -> u8 {
        match self {
            Self::Argon2id => KDF_TAG_ARGON2ID,
            Self::Pbkdf2HmacSha512 => KDF_TAG_PBKDF2,
        }
    }
}

/// A complete, serializable key-derivation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Selected algorithm.
    pub algorithm: KdfAlgorithm,

    /// Argon2id memory cost in KiB. Zero for PBKDF2.
    pub mem_kib: u32,

    /// Argon2id time cost (passes). Zero for PBKDF2.
    pub passes: u32,

    /// Argon2id parallelism (lanes). Zero for PBKDF2.
    pub parallelism: u32,

    /// PBKDF2 iteration count. Zero for Argon2id.
    pub pbkdf2_iters: u32,

    /// Expected salt length in bytes.
    pub salt_len: u16,

    /// Derived key length in bytes.
    pub out_len: u16,
}

impl KdfParams {
    /// Argon2id parameters with an explicit memory cost.
    #[must_use]
    pub fn argon2id(mem_kib: u32, passes: u32, parallelism: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            mem_kib,
            passes,
            parallelism,
            pbkdf2_iters: 0,
            salt_len: SALT_LEN as u16,
            out_len: KDF_OUT_LEN as u16,
        }
    }

    /// Default Argon2id parameters used when no benchmark has been run.
    #[must_use]
    pub fn argon2id_default() -> Self {
        Self::argon2id(ARGON_MEMORY, ARGON_TIME, ARGON_THREADS)
    }

    /// PBKDF2-HMAC-SHA512 fallback parameters.
    #[must_use]
    pub fn pbkdf2(iterations: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Pbkdf2HmacSha512,
            mem_kib: 0,
            passes: 0,
            parallelism: 0,
            pbkdf2_iters: iterations,
            salt_len: SALT_LEN as u16,
            out_len: KDF_OUT_LEN as u16,
        }
    }

    /// Default PBKDF2 fallback parameters.
    #[must_use]
    pub fn pbkdf2_default() -> Self {
        Self::pbkdf2(PBKDF2_MIN_ITERS)
    }

    /// Checks every field against its documented range.
    ///
    /// Fields belonging to the non-selected algorithm must be zero so that
    /// serialization round-trips losslessly.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KdfParamsInvalid`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if usize::from(self.salt_len) != SALT_LEN {
            return Err(VaultError::KdfParamsInvalid(format!(
                "salt length {} (expected {SALT_LEN})",
                self.salt_len
            )));
        }
        if usize::from(self.out_len) != KDF_OUT_LEN {
            return Err(VaultError::KdfParamsInvalid(format!(
                "output length {} (expected {KDF_OUT_LEN})",
                self.out_len
            )));
        }

        match self.algorithm {
            KdfAlgorithm::Argon2id => {
                if !(ARGON_MEMORY_FLOOR..=ARGON_MEMORY_CAP).contains(&self.mem_kib) {
                    return Err(VaultError::KdfParamsInvalid(format!(
                        "memory cost {} KiB outside {ARGON_MEMORY_FLOOR}..={ARGON_MEMORY_CAP}",
                        self.mem_kib
                    )));
                }
                if !(1..=ARGON_TIME_MAX).contains(&self.passes) {
                    return Err(VaultError::KdfParamsInvalid(format!(
                        "time cost {} outside 1..={ARGON_TIME_MAX}",
                        self.passes
                    )));
                }
                if !(1..=ARGON_THREADS_MAX).contains(&self.parallelism) {
                    return Err(VaultError::KdfParamsInvalid(format!(
                        "parallelism {} outside 1..={ARGON_THREADS_MAX}",
                        self.parallelism
                    )));
                }
                if self.pbkdf2_iters != 0 {
                    return Err(VaultError::KdfParamsInvalid(
                        "pbkdf2 iterations set on argon2id record".to_owned(),
                    ));
                }
            }
            KdfAlgorithm::Pbkdf2HmacSha512 => {
                if !(PBKDF2_MIN_ITERS..=PBKDF2_MAX_ITERS).contains(&self.pbkdf2_iters) {
                    return Err(VaultError::KdfParamsInvalid(format!(
                        "iteration count {} outside {PBKDF2_MIN_ITERS}..={PBKDF2_MAX_ITERS}",
                        self.pbkdf2_iters
                    )));
                }
                if self.mem_kib != 0 || self.passes != 0 || self.parallelism != 0 {
                    return Err(VaultError::KdfParamsInvalid(
                        "argon2 costs set on pbkdf2 record".to_owned(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Serializes into the fixed-width portable record.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; KDF_PARAMS_LEN] {
        let mut out = [0u8; KDF_PARAMS_LEN];
        out[0] = self.algorithm.tag();
        out[1..5].copy_from_slice(&self.mem_kib.to_be_bytes());
        out[5..9].copy_from_slice(&self.passes.to_be_bytes());
        out[9..13].copy_from_slice(&self.parallelism.to_be_bytes());
        out[13..17].copy_from_slice(&self.pbkdf2_iters.to_be_bytes());
        out[17..19].copy_from_slice(&self.salt_len.to_be_bytes());
        out[19..21].copy_from_slice(&self.out_len.to_be_bytes());
        out
    }

    /// Parses the fixed-width portable record.
    ///
    /// # Errors
    ///
    /// [`VaultError::Malformed`] on wrong length,
    /// [`VaultError::KdfParamsInvalid`] on an unknown algorithm tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KDF_PARAMS_LEN {
            return Err(VaultError::malformed(format!(
                "kdf parameter record: expected {KDF_PARAMS_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let algorithm = match bytes[0] {
            KDF_TAG_ARGON2ID => KdfAlgorithm::Argon2id,
            KDF_TAG_PBKDF2 => KdfAlgorithm::Pbkdf2HmacSha512,
            tag => {
                return Err(VaultError::KdfParamsInvalid(format!(
                    "unknown algorithm tag 0x{tag:02x}"
                )));
            }
        };

        let read_u32 = |range: std::ops::Range<usize>| {
            u32::from_be_bytes(bytes[range].try_into().expect("fixed slice"))
        };
        let read_u16 = |range: std::ops::Range<usize>| {
            u16::from_be_bytes(bytes[range].try_into().expect("fixed slice"))
        };

        Ok(Self {
            algorithm,
            mem_kib: read_u32(1..5),
            passes: read_u32(5..9),
            parallelism: read_u32(9..13),
            pbkdf2_iters: read_u32(13..17),
            salt_len: read_u16(17..19),
            out_len: read_u16(19..21),
        })
    }
}
