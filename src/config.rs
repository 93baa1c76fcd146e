//! Application configuration and cryptographic constants.
//!
//! This module defines the core constants used throughout the vault core:
//! - Cryptographic parameters (key sizes, nonce sizes, KDF bounds)
//! - On-disk layout (file names, magic bytes, format versions)
//! - The login latency contract (floor and jitter)
//!
//! These constants ensure consistency across the codebase and serve as the
//! single source of truth for the persisted formats.

/// The application name used in user-facing output and prompts.
pub const APP_NAME: &str = "gvault";

/// Size of a data-encryption key in bytes.
///
/// 32 bytes (256 bits) for AES-256-GCM.
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes.
///
/// Standard 12 bytes (96 bits) as recommended by NIST SP 800-38D.
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Minimum length of a valid ciphertext frame: nonce plus tag.
///
/// A zero-byte plaintext still produces a frame of this size.
pub const MIN_FRAME_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// Length of the random salt used for key derivation in bytes.
pub const SALT_LEN: usize = 16;

/// Length of a derived key (KEK or backup key) in bytes.
pub const KDF_OUT_LEN: usize = 32;

/// Argon2id time cost (number of passes).
pub const ARGON_TIME: u32 = 3;

/// Argon2id memory cost in KiB.
///
/// 64 MiB is the fallback when no benchmark has been run. The benchmark
/// may move this up to [`ARGON_MEMORY_CAP`].
pub const ARGON_MEMORY: u32 = 64 * 1024;

/// Argon2id parallelism factor (number of lanes).
pub const ARGON_THREADS: u32 = 4;

/// Safety floor for the Argon2id memory cost in KiB.
///
/// The benchmark never selects a memory cost below 16 MiB, no matter how
/// slow the host is.
pub const ARGON_MEMORY_FLOOR: u32 = 16 * 1024;

/// Upper bound for the Argon2id memory cost in KiB.
pub const ARGON_MEMORY_CAP: u32 = 256 * 1024;

/// Maximum accepted Argon2id time cost.
pub const ARGON_TIME_MAX: u32 = 16;

/// Maximum accepted Argon2id parallelism.
pub const ARGON_THREADS_MAX: u32 = 64;

/// Minimum accepted PBKDF2-HMAC-SHA512 iteration count.
pub const PBKDF2_MIN_ITERS: u32 = 600_000;

/// Maximum accepted PBKDF2-HMAC-SHA512 iteration count.
pub const PBKDF2_MAX_ITERS: u32 = 50_000_000;

/// Lower edge of the key-derivation benchmark target window, in milliseconds.
pub const BENCH_TARGET_LOW_MS: u64 = 400;

/// Upper edge of the key-derivation benchmark target window, in milliseconds.
pub const BENCH_TARGET_HIGH_MS: u64 = 800;

/// Algorithm tag for Argon2id in the serialized parameter record.
pub const KDF_TAG_ARGON2ID: u8 = 0x01;

/// Algorithm tag for PBKDF2-HMAC-SHA512 in the serialized parameter record.
pub const KDF_TAG_PBKDF2: u8 = 0x02;

/// Size of the fixed-width serialized parameter record in bytes.
///
/// `tag(1) ‖ memKiB(4) ‖ passes(4) ‖ parallelism(4) ‖ pbkdf2Iters(4) ‖
/// saltLen(2) ‖ outLen(2)`, all integers big-endian.
pub const KDF_PARAMS_LEN: usize = 21;

/// Associated-data label binding the MASTER wrapped key to its role.
pub const AD_MASTER: &[u8] = b"MASTER-VMK";

/// Associated-data label binding the DECOY wrapped key to its role.
pub const AD_DECOY: &[u8] = b"DECOY-DVMK";

/// File name of the persisted password store, relative to the vault root.
pub const STORE_FILE_NAME: &str = "password_store";

/// File name of the auxiliary salt file, relative to the vault root.
///
/// Present only when salt material is split out of the store; the panic
/// executor destroys it in phase 1 regardless.
pub const SALT_FILE_NAME: &str = "salt";

/// Format version byte of the password store file.
pub const STORE_VERSION: u8 = 1;

/// Directory holding encrypted data files, relative to the vault root.
pub const FILES_DIR: &str = "files";

/// Directory holding encrypted metadata, relative to the vault root.
pub const METADATA_DIR: &str = "metadata";

/// Directory holding audit material, relative to the vault root.
pub const LOGS_DIR: &str = "logs";

/// Floor of the classification latency contract, in milliseconds.
///
/// Every `classify` call lasts at least this long regardless of outcome.
pub const CLASSIFY_FLOOR_MS: u64 = 900;

/// Width of the uniform jitter added on top of the latency floor, in
/// milliseconds.
pub const CLASSIFY_JITTER_MS: u64 = 300;

/// Magic bytes identifying a backup file.
pub const BACKUP_MAGIC: &[u8; 8] = b"GVBACKUP";

/// Backup format version, ASCII decimal.
pub const BACKUP_VERSION: &[u8; 3] = b"1.0";

/// File extension for backup outputs.
///
/// Files carrying it are excluded from subsequent backups.
pub const BACKUP_EXTENSION: &str = "gvbackup";

/// Manifest schema version string.
pub const MANIFEST_VERSION: &str = "1.0";

/// Chunk size used when overwriting a file before unlinking it, in bytes.
pub const OVERWRITE_CHUNK: usize = 64 * 1024;

/// Upper bound on the serialized length of a wrapped-key frame.
///
/// A wrapped 32-byte key is nonce + key + tag = 60 bytes; anything much
/// larger indicates a corrupt store file.
pub const MAX_WRAPPED_FRAME: usize = 4096;

/// Upper bound on an archive entry name, in bytes.
pub const MAX_ENTRY_NAME: usize = 4096;

/// Minimum required password length, enforced at the prompt.
pub const PASSWORD_MIN_LENGTH: usize = 8;
