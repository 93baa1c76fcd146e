//! Vault root layout and shared filesystem primitives.
//!
//! A [`VaultRoot`] is an explicit value threaded through every core
//! operation; the core holds no process-wide path state. The module also
//! provides the two filesystem primitives the rest of the core relies on:
//! atomic replacement and best-effort overwrite-then-unlink.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};

use tempfile::NamedTempFile;

use crate::config::{FILES_DIR, LOGS_DIR, METADATA_DIR, OVERWRITE_CHUNK, SALT_FILE_NAME, STORE_FILE_NAME};
use crate::error::{Result, VaultError};

/// Registry of vault roots currently open in this process.
///
/// Enforces the single-writer discipline: the password store, data tree,
/// and backup outputs of one root are only ever mutated by one holder of
/// a [`VaultLock`].
static OPEN_ROOTS: LazyLock<Mutex<BTreeSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(BTreeSet::new()));

/// The directory a vault lives in, with accessors for its fixed layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRoot {
    root: PathBuf,
}

impl VaultRoot {
    /// Wraps a directory path as a vault root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { root: path.into() }
    }

    /// The root directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted password store.
    #[must_use]
    pub fn password_store_path(&self) -> PathBuf {
        self.root.join(STORE_FILE_NAME)
    }

    /// Path of the auxiliary salt file, if any salts are split out.
    #[must_use]
    pub fn salt_path(&self) -> PathBuf {
        self.root.join(SALT_FILE_NAME)
    }

    /// Directory of encrypted data files.
    #[must_use]
    pub fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    /// Directory of encrypted metadata.
    #[must_use]
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    /// Directory of audit material.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Creates the root and its standard subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn init_layout(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.files_dir())?;
        fs::create_dir_all(self.metadata_dir())?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Acquires the process-local advisory lock for this root.
    ///
    /// # Errors
    ///
    /// Returns an I/O error of kind `WouldBlock` if another holder in this
    /// process already has the root open.
    pub fn lock(&self) -> Result<VaultLock> {
        let key = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());

        let mut open = OPEN_ROOTS.lock().unwrap_or_else(PoisonError::into_inner);
        if !open.insert(key.clone()) {
            return Err(VaultError::Io(std::io::Error::new(
                ErrorKind::WouldBlock,
                format!("vault already open in this process: {}", key.display()),
            )));
        }

        Ok(VaultLock { key })
    }
}

/// Held proof of the single-writer discipline; released on drop.
#[derive(Debug)]
pub struct VaultLock {
    key: PathBuf,
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        let mut open = OPEN_ROOTS.lock().unwrap_or_else(PoisonError::into_inner);
        open.remove(&self.key);
    }
}

/// Atomically replaces `path` with `bytes`.
///
/// Writes to a temporary file in the same directory, fsyncs it, and
/// renames it over the target, so readers observe either the old record
/// or the complete new one.
///
/// # Errors
///
/// Returns an error on any underlying storage failure.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VaultError::Io(e.error))?;

    Ok(())
}

/// Overwrites a file with zeros and unlinks it.
///
/// Best effort: on wear-leveled or copy-on-write storage the old blocks
/// may survive the overwrite. A missing file counts as already destroyed.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be overwritten or
/// removed.
pub fn shred_file(path: &Path) -> Result<()> {
    let mut file = match OpenOptions::new().write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(0))?;

    let zeros = vec![0u8; OVERWRITE_CHUNK];
    let mut remaining = len;
    while remaining > 0 {
        let chunk = usize::try_from(remaining.min(zeros.len() as u64)).unwrap_or(OVERWRITE_CHUNK);
        file.write_all(&zeros[..chunk])?;
        remaining -= chunk as u64;
    }

    file.sync_all()?;
    drop(file);

    fs::remove_file(path)?;
    Ok(())
}
