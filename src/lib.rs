//! gvault - security core of a local, offline file vault.
//!
//! A vault that answers three questions with strong guarantees:
//! - AES-256-GCM authenticated encryption turns user data into ciphertext
//!   on which any tamper is detected
//! - Argon2id (PBKDF2-HMAC-SHA512 fallback) gates access behind a short
//!   human password while resisting side channels and offline brute force
//! - a triple-password scheme (MASTER / DECOY / PANIC) lets a distressed
//!   user trigger cryptographic erasure that no one can undo
//!
//! Plus an integrity-preserving encrypted archive format for backup and
//! restore.

pub mod backup;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod kdf;
pub mod panic;
pub mod progress;
pub mod secret;
pub mod store;
pub mod ui;
pub mod vault;

pub use codec::Codec;
pub use error::{Result, VaultError};
pub use kdf::KdfParams;
pub use panic::{PanicExecutor, PanicReport};
pub use progress::{CancelToken, NullSink, ProgressEvent, ProgressSink};
pub use secret::{DataKey, Password};
pub use store::{Classification, PasswordStore, Role};
pub use vault::VaultRoot;
