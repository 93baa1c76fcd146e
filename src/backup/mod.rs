//! Encrypted backup and restore.
//!
//! A backup packages the vault's data tree into a single framed file:
//!
//! ```text
//! "GVBACKUP"(8) ‖ "1.0"(3) ‖ salt(16) ‖ kdf-params(21) ‖ nonce(12) ‖ ct
//! ```
//!
//! The ciphertext is the AEAD encryption of a compressed entry-stream
//! archive ([`archive`]) whose first frame is the JSON manifest
//! ([`BackupManifest`]). The backup key is derived from a user-supplied
//! password with the standard KDF, so a backup restores on a wiped
//! machine; salt and parameters sit in the header before the AEAD input,
//! and the whole header is bound as associated data.
//!
//! Restore is staged: the live tree is moved to a rollback location
//! before the first extracted byte reaches it, the extracted tree is
//! re-hashed against the manifest, and only then is staging swapped into
//! place. Any failure rolls the live tree back.

use std::fs;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use walkdir::WalkDir;

mod archive;
mod manifest;

pub use archive::ArchiveEntry;
pub use manifest::BackupManifest;

use crate::codec::{Codec, zeroize_buf};
use crate::config::{
    BACKUP_EXTENSION, BACKUP_MAGIC, BACKUP_VERSION, KDF_PARAMS_LEN, MANIFEST_VERSION,
    MIN_FRAME_SIZE, SALT_FILE_NAME, SALT_LEN, STORE_FILE_NAME,
};
use crate::error::{Result, VaultError};
use crate::kdf::{self, KdfParams};
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::secret::Password;
use crate::store::DIGEST_LEN;
use crate::vault::{self, VaultRoot};

/// Length of the plaintext file header preceding the AEAD frame.
const HEADER_LEN: usize = 8 + 3 + SALT_LEN + KDF_PARAMS_LEN;

/// Manifest summary returned by [`verify`] and [`create`].
#[derive(Debug, Clone)]
pub struct BackupInfo {
    /// Whether the manifest decrypted and parsed. Always true on the `Ok`
    /// path; invalid backups surface as structured errors.
    pub valid: bool,

    /// Manifest schema version.
    pub version: String,

    /// RFC 3339 creation timestamp.
    pub creation_date: String,

    /// Number of data entries.
    pub file_count: u32,

    /// Sum of entry sizes in bytes.
    pub total_size: u64,
}

impl BackupInfo {
    fn from_manifest(manifest: &BackupManifest) -> Self {
        Self {
            valid: true,
            version: manifest.version.clone(),
            creation_date: manifest.creation_date.clone(),
            file_count: manifest.file_count,
            total_size: manifest.total_size,
        }
    }
}

/// Options for [`create`].
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// KDF configuration for the backup key.
    pub params: KdfParams,

    /// Skip the post-write manifest round-trip. Explicit only; the
    /// default always verifies.
    pub skip_verify: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self { params: KdfParams::argon2id_default(), skip_verify: false }
    }
}

/// Creates an encrypted backup of the vault's data tree.
///
/// Walks the tree excluding the password store, auxiliary salt material,
/// and previous backup outputs; builds the manifest over the canonical
/// entry ordering; compresses, encrypts, and writes the framed file
/// atomically. Unless `skip_verify` is set, the manifest is round-tripped
/// out of the written file before returning.
///
/// # Errors
///
/// Propagates KDF, storage, and cancellation failures; never leaves a
/// partial file at `out`.
pub fn create(
    root: &VaultRoot,
    out: &Path,
    password: &Password,
    opts: &CreateOptions,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<BackupInfo> {
    opts.params.validate()?;

    let entries = collect_entries(root, out, cancel, sink)?;
    let file_count = u32::try_from(entries.len())
        .map_err(|_| VaultError::malformed("too many entries for one backup"))?;
    let total_size: u64 = entries.iter().map(|e| e.data.len() as u64).sum();

    let digests: Vec<(String, [u8; DIGEST_LEN])> = entries
        .iter()
        .map(|e| (e.name.clone(), Sha256::digest(&e.data).into()))
        .collect();
    let checksum = hex::encode(vault_digest(&digests));

    let salt = kdf::generate_salt()?;
    let key = kdf::derive(password, &salt, &opts.params)?;

    let manifest = BackupManifest {
        version: MANIFEST_VERSION.to_owned(),
        creation_date: chrono::Utc::now().to_rfc3339(),
        file_count,
        total_size,
        vault_checksum: checksum,
        kdf_salt: hex::encode(salt),
        kdf_params: hex::encode(opts.params.to_bytes()),
    };

    let mut plaintext = archive::build(&manifest.to_json()?, &entries)?;

    let header = build_header(&salt, &opts.params);
    let frame = Codec::new(&key).encrypt(&plaintext, &header)?;
    zeroize_buf(&mut plaintext);

    let mut file = Vec::with_capacity(header.len() + frame.len());
    file.extend_from_slice(&header);
    file.extend_from_slice(&frame);
    vault::atomic_write(out, &file)?;

    tracing::info!(out = %out.display(), file_count, total_size, "backup written");

    if opts.skip_verify {
        tracing::warn!(out = %out.display(), "backup verification explicitly skipped");
        return Ok(BackupInfo::from_manifest(&manifest));
    }
    verify(out, password)
}

/// Verifies a backup file without extracting anything to disk.
///
/// Parses the magic and version, decrypts the frame, and reads only the
/// manifest portion of the archive.
///
/// # Errors
///
/// [`VaultError::Malformed`] for framing, version, or manifest defects;
/// [`VaultError::Tamper`] if authentication fails (which a wrong password
/// also produces).
pub fn verify(path: &Path, password: &Password) -> Result<BackupInfo> {
    let (header, frame) = read_frame(path)?;

    let key = kdf::derive(password, &header.salt, &header.params)?;
    let mut plaintext = Codec::new(&key).decrypt(&frame, &header.bytes)?;

    let manifest_json = archive::read_manifest(&plaintext);
    zeroize_buf(&mut plaintext);
    let manifest = BackupManifest::from_json(&manifest_json?)?;

    Ok(BackupInfo::from_manifest(&manifest))
}

/// Restore states, entered strictly in order on the success path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreState {
    Verifying,
    StagingRollback,
    Extracting,
    VerifyingDigest,
    Committing,
    Done,
    RollingBack,
    Failed,
}

impl RestoreState {
    fn label(self) -> &'static str {
        match self {
            Self::Verifying => "verifying",
            Self::StagingRollback => "staging-rollback",
            Self::Extracting => "extracting",
            Self::VerifyingDigest => "verifying-digest",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::RollingBack => "rolling-back",
            Self::Failed => "failed",
        }
    }
}

/// Restores a backup into a vault root.
///
/// The live tree is staged to a rollback location before extraction, the
/// extracted tree is re-hashed against the manifest, and staging is then
/// swapped into place. A failure after staging rolls the live tree back;
/// a failure before it leaves the root untouched. Entry paths that would
/// escape the root — or that name the password store — are rejected
/// before any byte is written.
///
/// # Errors
///
/// [`VaultError::Tamper`] / [`VaultError::Malformed`] from verification,
/// [`VaultError::Cancelled`] if the token trips between files, and
/// storage failures.
pub fn restore(
    path: &Path,
    root: &VaultRoot,
    password: &Password,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<()> {
    let mut state = RestoreState::Verifying;
    enter(state, sink);

    let (header, frame) = read_frame(path)?;
    let key = kdf::derive(password, &header.salt, &header.params)?;
    let mut plaintext = Codec::new(&key).decrypt(&frame, &header.bytes)?;
    let parsed = archive::read_all(&plaintext);
    zeroize_buf(&mut plaintext);
    let (manifest_json, entries) = parsed?;
    let manifest = BackupManifest::from_json(&manifest_json)?;

    // Path-traversal guard: every target must resolve strictly below the
    // root, and nothing may overwrite the credential files.
    let mut planned: Vec<(PathBuf, &ArchiveEntry)> = Vec::with_capacity(entries.len());
    for entry in &entries {
        planned.push((entry_rel_path(&entry.name)?, entry));
    }

    fs::create_dir_all(root.path())?;

    state = RestoreState::StagingRollback;
    enter(state, sink);
    let parent = root.path().parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let rollback = TempDir::with_prefix_in(".gvault-rollback-", parent)?;
    let staging = TempDir::with_prefix_in(".gvault-staging-", parent)?;
    stage_rollback(root, rollback.path())?;

    let result = (|| -> Result<()> {
        state = RestoreState::Extracting;
        enter(state, sink);
        let total = planned.len() as u64;
        for (index, (rel, entry)) in planned.iter().enumerate() {
            cancel.checkpoint()?;
            sink.report(&ProgressEvent::Entry { name: &entry.name, index: index as u64, total });

            let target = staging.path().join(rel);
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&target, &entry.data)?;
        }

        state = RestoreState::VerifyingDigest;
        enter(state, sink);
        let extracted = hash_tree(staging.path())?;
        let checksum = hex::encode(vault_digest(&extracted));
        if checksum != manifest.vault_checksum {
            return Err(VaultError::malformed("restored tree does not match the manifest digest"));
        }

        state = RestoreState::Committing;
        enter(state, sink);
        move_children(staging.path(), root.path())
    })();

    match result {
        Ok(()) => {
            state = RestoreState::Done;
            enter(state, sink);
            root.init_layout()?;
            tracing::info!(root = %root.path().display(), file_count = manifest.file_count, "restore complete");
            Ok(())
        }
        Err(e) => {
            enter(RestoreState::RollingBack, sink);
            roll_back(root, rollback.path());
            enter(RestoreState::Failed, sink);
            tracing::warn!(state = state.label(), error = %e, "restore failed, live tree rolled back");
            Err(e)
        }
    }
}

fn enter(state: RestoreState, sink: &dyn ProgressSink) {
    tracing::debug!(state = state.label(), "restore state");
    sink.report(&ProgressEvent::Phase { name: state.label() });
}

/// Fixed-layout file header; also the AEAD associated data.
struct BackupHeader {
    bytes: [u8; HEADER_LEN],
    salt: [u8; SALT_LEN],
    params: KdfParams,
}

fn build_header(salt: &[u8; SALT_LEN], params: &KdfParams) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..8].copy_from_slice(BACKUP_MAGIC);
    header[8..11].copy_from_slice(BACKUP_VERSION);
    header[11..11 + SALT_LEN].copy_from_slice(salt);
    header[11 + SALT_LEN..].copy_from_slice(&params.to_bytes());
    header
}

fn read_frame(path: &Path) -> Result<(BackupHeader, Vec<u8>)> {
    let data = fs::read(path)?;

    if data.len() < HEADER_LEN + MIN_FRAME_SIZE {
        return Err(VaultError::malformed(format!(
            "backup file too short: {} bytes",
            data.len()
        )));
    }
    if &data[..8] != BACKUP_MAGIC {
        return Err(VaultError::malformed("not a backup file (bad magic)"));
    }
    if &data[8..11] != BACKUP_VERSION {
        return Err(VaultError::malformed(format!(
            "unsupported backup version {:?}",
            String::from_utf8_lossy(&data[8..11])
        )));
    }

    let mut bytes = [0u8; HEADER_LEN];
    bytes.copy_from_slice(&data[..HEADER_LEN]);

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&data[11..11 + SALT_LEN]);
    let params = KdfParams::from_bytes(&data[11 + SALT_LEN..HEADER_LEN])?;

    Ok((BackupHeader { bytes, salt, params }, data[HEADER_LEN..].to_vec()))
}

/// Walks the data tree into sorted archive entries.
fn collect_entries(
    root: &VaultRoot,
    out: &Path,
    cancel: &CancelToken,
    sink: &dyn ProgressSink,
) -> Result<Vec<ArchiveEntry>> {
    let store_path = root.password_store_path();
    let salt_path = root.salt_path();

    let mut paths: Vec<PathBuf> = WalkDir::new(root.path())
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            *p != store_path
                && *p != salt_path
                && p != out
                && p.extension().is_none_or(|ext| ext != BACKUP_EXTENSION)
        })
        .collect();
    paths.sort();

    let total = paths.len() as u64;
    let mut entries = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        cancel.checkpoint()?;

        let name = entry_name(root.path(), path)?;
        sink.report(&ProgressEvent::Entry { name: &name, index: index as u64, total });

        let data = fs::read(path)?;
        entries.push(ArchiveEntry { name, data });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Builds the canonical `/`-separated entry name for a file under `root`.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| VaultError::malformed(format!("{} outside the vault root", path.display())))?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| VaultError::malformed("entry name is not utf-8"))?,
            ),
            _ => {
                return Err(VaultError::malformed(format!(
                    "unrepresentable path {}",
                    path.display()
                )));
            }
        }
    }

    Ok(parts.join("/"))
}

/// Validates an archive entry name and converts it to a relative path.
///
/// Rejects absolute paths, parent or current-directory components,
/// backslashes, and names that would land on the credential files.
fn entry_rel_path(name: &str) -> Result<PathBuf> {
    let escape = || VaultError::malformed(format!("entry path {name:?} escapes the restore root"));

    if name.is_empty() || name.contains('\\') || name.starts_with('/') {
        return Err(escape());
    }

    let mut rel = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            _ => return Err(escape()),
        }
    }
    if rel.as_os_str().is_empty() {
        return Err(escape());
    }

    if let Some(first) = rel.components().next()
        && let Component::Normal(part) = first
        && (part == STORE_FILE_NAME || part == SALT_FILE_NAME)
    {
        return Err(VaultError::malformed(format!(
            "entry path {name:?} collides with credential storage"
        )));
    }

    Ok(rel)
}

/// SHA-256 over `name ‖ 0x00 ‖ sha256(bytes)` for entries sorted by name.
///
/// The digest of an empty tree is the SHA-256 of the empty byte string.
fn vault_digest(entries: &[(String, [u8; DIGEST_LEN])]) -> [u8; DIGEST_LEN] {
    debug_assert!(entries.is_sorted_by(|a, b| a.0 <= b.0));

    let mut hasher = Sha256::new();
    for (name, digest) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest);
    }
    hasher.finalize().into()
}

/// Hashes every file below `dir` into sorted `(name, digest)` pairs.
fn hash_tree(dir: &Path) -> Result<Vec<(String, [u8; DIGEST_LEN])>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(dir, entry.path())?;
        let data = fs::read(entry.path())?;
        entries.push((name, Sha256::digest(&data).into()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Moves the root's live contents into the rollback location, leaving
/// only the credential files behind.
fn stage_rollback(root: &VaultRoot, rollback: &Path) -> Result<()> {
    for entry in fs::read_dir(root.path())? {
        let entry = entry?;
        let name = entry.file_name();
        if name == STORE_FILE_NAME || name == SALT_FILE_NAME {
            continue;
        }
        fs::rename(entry.path(), rollback.join(&name))?;
    }
    Ok(())
}

/// Moves every child of `from` into `to`.
fn move_children(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        fs::rename(entry.path(), to.join(entry.file_name()))?;
    }
    Ok(())
}

/// Best-effort return of the rollback contents to the live root.
fn roll_back(root: &VaultRoot, rollback: &Path) {
    let entries = match fs::read_dir(rollback) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "rollback location unreadable");
            return;
        }
    };

    for entry in entries.filter_map(std::result::Result::ok) {
        let target = root.path().join(entry.file_name());
        // A partially committed child may occupy the slot; clear it so the
        // pre-restore tree wins.
        if target.is_dir() {
            let _ = fs::remove_dir_all(&target);
        } else if target.exists() {
            let _ = fs::remove_file(&target);
        }
        if let Err(e) = fs::rename(entry.path(), &target) {
            tracing::warn!(target = %target.display(), error = %e, "rollback move failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::progress::NullSink;

    const BACKUP_PW: &[u8] = b"B@ck-up1";

    fn fast_opts() -> CreateOptions {
        CreateOptions {
            params: KdfParams::argon2id(crate::config::ARGON_MEMORY_FLOOR, 1, 1),
            skip_verify: false,
        }
    }

    fn seeded_root(base: &Path) -> VaultRoot {
        let root = VaultRoot::new(base.join("vault"));
        fs::create_dir_all(root.path()).unwrap();

        let payload: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        fs::write(root.path().join("a.bin"), &payload).unwrap();
        fs::create_dir_all(root.path().join("nested")).unwrap();
        fs::write(root.path().join("nested/b.txt"), b"payload").unwrap();
        root
    }

    fn snapshot(root: &VaultRoot) -> Vec<(String, [u8; DIGEST_LEN])> {
        hash_tree(root.path()).unwrap()
    }

    fn run_create(root: &VaultRoot, out: &Path) -> BackupInfo {
        create(
            root,
            out,
            &Password::from_slice(BACKUP_PW),
            &fast_opts(),
            &CancelToken::new(),
            &NullSink,
        )
        .unwrap()
    }

    #[test]
    fn test_backup_roundtrip() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("vault.gvbackup");

        let before = snapshot(&root);
        let info = run_create(&root, &out);
        assert!(info.valid);
        assert_eq!(info.file_count, 2);
        assert_eq!(info.total_size, 1024 + 7);

        // Wipe and re-create the vault empty, then restore.
        fs::remove_dir_all(root.path()).unwrap();
        fs::create_dir_all(root.path()).unwrap();

        restore(&out, &root, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink)
            .unwrap();

        let after = snapshot(&root);
        assert_eq!(before, after);
        assert_eq!(fs::read(root.path().join("nested/b.txt")).unwrap(), b"payload");
    }

    #[test]
    fn test_verify_reports_manifest_fields() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("vault.gvbackup");
        run_create(&root, &out);

        let info = verify(&out, &Password::from_slice(BACKUP_PW)).unwrap();
        assert!(info.valid);
        assert_eq!(info.version, MANIFEST_VERSION);
        assert_eq!(info.file_count, 2);
        assert!(!info.creation_date.is_empty());
    }

    #[test]
    fn test_bit_flip_fails_verification() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("vault.gvbackup");
        run_create(&root, &out);

        let original = fs::read(&out).unwrap();

        // Any single-bit flip past the magic must fail verification:
        // header bytes are bound as associated data, the rest is AEAD
        // ciphertext.
        for offset in [8, 12, HEADER_LEN, HEADER_LEN + 5, original.len() - 1] {
            let mut bytes = original.clone();
            bytes[offset] ^= 0x01;
            fs::write(&out, &bytes).unwrap();

            let result = verify(&out, &Password::from_slice(BACKUP_PW));
            assert!(result.is_err(), "flip at offset {offset} went undetected");
        }
    }

    #[test]
    fn test_wrong_password_is_tamper() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("vault.gvbackup");
        run_create(&root, &out);

        let result = verify(&out, &Password::from_slice(b"not-the-password"));
        assert!(matches!(result, Err(VaultError::Tamper)));
    }

    #[test]
    fn test_wrong_magic_is_malformed() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("bogus.gvbackup");
        fs::write(&out, vec![0u8; 256]).unwrap();

        let result = verify(&out, &Password::from_slice(BACKUP_PW));
        assert!(matches!(result, Err(VaultError::Malformed(_))));
    }

    #[test]
    fn test_store_file_is_excluded() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        fs::write(root.password_store_path(), b"credential bytes").unwrap();
        let out = dir.path().join("vault.gvbackup");

        let info = run_create(&root, &out);
        assert_eq!(info.file_count, 2);

        let fresh = VaultRoot::new(dir.path().join("fresh"));
        fs::create_dir_all(fresh.path()).unwrap();
        restore(&out, &fresh, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink)
            .unwrap();
        assert!(!fresh.password_store_path().exists());
        assert!(fresh.path().join("a.bin").exists());
    }

    #[test]
    fn test_previous_backups_are_excluded() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());

        // A backup written inside the root must not be swallowed by the
        // next one.
        let inner = root.path().join("old.gvbackup");
        run_create(&root, &inner);

        let out = dir.path().join("vault.gvbackup");
        let info = run_create(&root, &out);
        assert_eq!(info.file_count, 2);
    }

    #[test]
    fn test_empty_vault_roundtrip() {
        let dir = tempdir().unwrap();
        let root = VaultRoot::new(dir.path().join("empty"));
        fs::create_dir_all(root.path()).unwrap();
        let out = dir.path().join("empty.gvbackup");

        let info = run_create(&root, &out);
        assert_eq!(info.file_count, 0);
        assert_eq!(info.total_size, 0);

        restore(&out, &root, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink)
            .unwrap();
        assert!(snapshot(&root).is_empty());
    }

    #[test]
    fn test_empty_digest_is_sha256_of_nothing() {
        assert_eq!(
            hex::encode(vault_digest(&[])),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_single_zero_byte_file_roundtrip() {
        let dir = tempdir().unwrap();
        let root = VaultRoot::new(dir.path().join("tiny"));
        fs::create_dir_all(root.path()).unwrap();
        fs::write(root.path().join("empty.bin"), b"").unwrap();
        let out = dir.path().join("tiny.gvbackup");

        let info = run_create(&root, &out);
        assert_eq!(info.file_count, 1);
        assert_eq!(info.total_size, 0);

        fs::remove_dir_all(root.path()).unwrap();
        fs::create_dir_all(root.path()).unwrap();
        restore(&out, &root, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink)
            .unwrap();
        assert_eq!(fs::read(root.path().join("empty.bin")).unwrap(), b"");
    }

    /// Writes a syntactically valid backup whose archive content is under
    /// test control.
    fn forged_backup(out: &Path, manifest: &BackupManifest, entries: &[ArchiveEntry]) {
        let params = fast_opts().params;
        let salt = [7u8; SALT_LEN];
        let key = kdf::derive(&Password::from_slice(BACKUP_PW), &salt, &params).unwrap();

        let plaintext = archive::build(&manifest.to_json().unwrap(), entries).unwrap();
        let header = build_header(&salt, &params);
        let frame = Codec::new(&key).encrypt(&plaintext, &header).unwrap();

        let mut file = header.to_vec();
        file.extend_from_slice(&frame);
        fs::write(out, &file).unwrap();
    }

    fn forged_manifest(entries: &[ArchiveEntry]) -> BackupManifest {
        let digests: Vec<(String, [u8; DIGEST_LEN])> = entries
            .iter()
            .map(|e| (e.name.clone(), Sha256::digest(&e.data).into()))
            .collect();
        BackupManifest {
            version: MANIFEST_VERSION.to_owned(),
            creation_date: "2026-01-15T10:30:00+00:00".to_owned(),
            file_count: entries.len() as u32,
            total_size: entries.iter().map(|e| e.data.len() as u64).sum(),
            vault_checksum: hex::encode(vault_digest(&digests)),
            kdf_salt: hex::encode([7u8; SALT_LEN]),
            kdf_params: hex::encode(fast_opts().params.to_bytes()),
        }
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("evil.gvbackup");

        let entries = vec![ArchiveEntry { name: "../evil".to_owned(), data: b"owned".to_vec() }];
        forged_backup(&out, &forged_manifest(&entries), &entries);

        let before = snapshot(&root);
        let result =
            restore(&out, &root, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink);

        assert!(matches!(result, Err(VaultError::Malformed(_))));
        assert_eq!(snapshot(&root), before, "live vault changed by rejected restore");
        assert!(!dir.path().join("evil").exists());
    }

    #[test]
    fn test_entry_overwriting_store_rejected() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("evil.gvbackup");

        let entries =
            vec![ArchiveEntry { name: STORE_FILE_NAME.to_owned(), data: b"evil".to_vec() }];
        forged_backup(&out, &forged_manifest(&entries), &entries);

        let result =
            restore(&out, &root, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink);
        assert!(matches!(result, Err(VaultError::Malformed(_))));
    }

    #[test]
    fn test_digest_mismatch_rolls_back() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("lying.gvbackup");

        let entries = vec![ArchiveEntry { name: "new.bin".to_owned(), data: b"new".to_vec() }];
        let mut manifest = forged_manifest(&entries);
        manifest.vault_checksum = "00".repeat(DIGEST_LEN);
        forged_backup(&out, &manifest, &entries);

        let before = snapshot(&root);
        let result =
            restore(&out, &root, &Password::from_slice(BACKUP_PW), &CancelToken::new(), &NullSink);

        assert!(matches!(result, Err(VaultError::Malformed(_))));
        assert_eq!(snapshot(&root), before, "rollback did not restore the live tree");
    }

    #[test]
    fn test_cancelled_restore_rolls_back() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("vault.gvbackup");
        run_create(&root, &out);

        let cancel = CancelToken::new();
        cancel.cancel();

        let before = snapshot(&root);
        let result = restore(&out, &root, &Password::from_slice(BACKUP_PW), &cancel, &NullSink);

        assert!(matches!(result, Err(VaultError::Cancelled)));
        assert_eq!(snapshot(&root), before);
    }

    #[test]
    fn test_cancelled_create_writes_nothing() {
        let dir = tempdir().unwrap();
        let root = seeded_root(dir.path());
        let out = dir.path().join("vault.gvbackup");

        let cancel = CancelToken::new();
        cancel.cancel();

        let result = create(
            &root,
            &out,
            &Password::from_slice(BACKUP_PW),
            &fast_opts(),
            &cancel,
            &NullSink,
        );
        assert!(matches!(result, Err(VaultError::Cancelled)));
        assert!(!out.exists());
    }

    #[test]
    fn test_entry_rel_path_guard() {
        assert!(entry_rel_path("files/a.bin").is_ok());
        assert!(entry_rel_path("../evil").is_err());
        assert!(entry_rel_path("/etc/passwd").is_err());
        assert!(entry_rel_path("a/../../b").is_err());
        assert!(entry_rel_path("a\\b").is_err());
        assert!(entry_rel_path("").is_err());
        assert!(entry_rel_path("./x").is_err());
        assert!(entry_rel_path(STORE_FILE_NAME).is_err());
        assert!(entry_rel_path(SALT_FILE_NAME).is_err());
    }
}
