//! Cryptographic erasure of a vault.
//!
//! Four strictly ordered phases. Phase 1 overwrites and unlinks the
//! password store and auxiliary salt material; once it completes, the
//! wrapped keys are unrecoverable and every remaining ciphertext is
//! permanently opaque. Phases 2 through 4 are defense-in-depth only:
//! their failures are recorded and swallowed, and the overwrite they
//! perform is unreliable on wear-leveled or copy-on-write storage.
//!
//! Dry-run mode replaces every destructive action with a log entry so a
//! user can rehearse without loss. The executor emits no user-facing
//! output; the returned report feeds the caller's audit pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, VaultError};
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::vault::{self, VaultRoot};

/// The four ordered phases of a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicPhase {
    /// Overwrite and unlink the password store and salt files. The only
    /// phase that delivers the security guarantee.
    DestroyKeys,

    /// Overwrite and unlink persisted vault metadata.
    DestroyMetadata,

    /// Overwrite and unlink the data tree. Best effort.
    DestroyData,

    /// Remove the remaining directory structure.
    RemoveDirs,
}

impl PanicPhase {
    /// Stable label used in reports and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DestroyKeys => "destroy-keys",
            Self::DestroyMetadata => "destroy-metadata",
            Self::DestroyData => "destroy-data",
            Self::RemoveDirs => "remove-dirs",
        }
    }
}

/// Outcome of one destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanicOutcome {
    /// The target was overwritten and unlinked (or the directory removed).
    Done,

    /// Dry-run: the action was logged, no byte was modified.
    DryRun,

    /// The action failed; later phases still ran.
    Failed(String),
}

/// One phase+target entry of the audit log.
#[derive(Debug, Clone)]
pub struct PanicLogEntry {
    /// Phase the action belongs to.
    pub phase: PanicPhase,

    /// Filesystem target of the action.
    pub target: PathBuf,

    /// What happened.
    pub outcome: PanicOutcome,
}

/// Structured result of a panic run.
#[derive(Debug, Default)]
pub struct PanicReport {
    /// Ordered phase+target entries.
    pub entries: Vec<PanicLogEntry>,

    /// Set when a cancellation request stopped the run after phase 1.
    pub cancelled: bool,
}

impl PanicReport {
    /// Whether any entry of the given phase failed.
    #[must_use]
    pub fn phase_failed(&self, phase: PanicPhase) -> bool {
        self.entries
            .iter()
            .any(|e| e.phase == phase && matches!(e.outcome, PanicOutcome::Failed(_)))
    }

    fn record(&mut self, phase: PanicPhase, target: &Path, outcome: PanicOutcome) {
        if let PanicOutcome::Failed(reason) = &outcome {
            tracing::warn!(phase = phase.label(), target = %target.display(), %reason, "panic action failed");
        } else {
            tracing::debug!(phase = phase.label(), target = %target.display(), "panic action");
        }
        self.entries.push(PanicLogEntry { phase, target: target.to_path_buf(), outcome });
    }
}

/// Executes the ordered destruction of a vault root.
pub struct PanicExecutor {
    dry_run: bool,
}

impl PanicExecutor {
    /// Creates an executor. With `dry_run` set, every destructive action
    /// is replaced by a log entry.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Runs all four phases against the vault root.
    ///
    /// Cancellation is checked between phases and ignored during phase 1:
    /// key destruction either completes or surfaces
    /// [`VaultError::PanicPhase1Failed`]. A cancellation honored later
    /// stops the run and is reflected in the report rather than an error,
    /// so the caller's audit pipeline still sees what was destroyed.
    ///
    /// # Errors
    ///
    /// [`VaultError::PanicPhase1Failed`] if key destruction did not
    /// complete; the caller is expected to retry. Until phase 1 succeeds
    /// the erasure guarantee is not delivered.
    pub fn execute(
        &self,
        root: &VaultRoot,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<PanicReport> {
        let mut report = PanicReport::default();

        self.destroy_keys(root, sink, &mut report)?;

        for phase in [PanicPhase::DestroyMetadata, PanicPhase::DestroyData, PanicPhase::RemoveDirs]
        {
            if cancel.is_cancelled() {
                tracing::info!(phase = phase.label(), "panic cancelled before phase");
                report.cancelled = true;
                return Ok(report);
            }
            match phase {
                PanicPhase::DestroyMetadata => self.destroy_metadata(root, sink, &mut report),
                PanicPhase::DestroyData => self.destroy_data(root, sink, &mut report),
                PanicPhase::RemoveDirs => self.remove_dirs(root, sink, &mut report),
                PanicPhase::DestroyKeys => unreachable!(),
            }
        }

        tracing::info!(entries = report.entries.len(), dry_run = self.dry_run, "panic complete");
        Ok(report)
    }

    /// Phase 1. After it completes, the vault and decoy master keys are
    /// cryptographically unrecoverable from persistent state.
    fn destroy_keys(
        &self,
        root: &VaultRoot,
        sink: &dyn ProgressSink,
        report: &mut PanicReport,
    ) -> Result<()> {
        let phase = PanicPhase::DestroyKeys;
        sink.report(&ProgressEvent::Phase { name: phase.label() });

        let mut failed = false;
        for target in [root.password_store_path(), root.salt_path()] {
            let outcome = self.shred(&target);
            failed |= matches!(outcome, PanicOutcome::Failed(_));
            report.record(phase, &target, outcome);
        }

        if failed {
            return Err(VaultError::PanicPhase1Failed);
        }
        Ok(())
    }

    /// Phase 2: metadata describing the vault contents.
    fn destroy_metadata(
        &self,
        root: &VaultRoot,
        sink: &dyn ProgressSink,
        report: &mut PanicReport,
    ) {
        let phase = PanicPhase::DestroyMetadata;
        sink.report(&ProgressEvent::Phase { name: phase.label() });

        for target in files_under(&root.metadata_dir()) {
            let outcome = self.shred(&target);
            report.record(phase, &target, outcome);
        }
    }

    /// Phase 3: every remaining file under the root. Best effort.
    fn destroy_data(&self, root: &VaultRoot, sink: &dyn ProgressSink, report: &mut PanicReport) {
        let phase = PanicPhase::DestroyData;
        sink.report(&ProgressEvent::Phase { name: phase.label() });

        for target in files_under(root.path()) {
            let outcome = self.shred(&target);
            report.record(phase, &target, outcome);
        }
    }

    /// Phase 4: the directory structure, children before parents.
    fn remove_dirs(&self, root: &VaultRoot, sink: &dyn ProgressSink, report: &mut PanicReport) {
        let phase = PanicPhase::RemoveDirs;
        sink.report(&ProgressEvent::Phase { name: phase.label() });

        let dirs: Vec<PathBuf> = WalkDir::new(root.path())
            .contents_first(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect();

        for target in dirs {
            let outcome = if self.dry_run {
                PanicOutcome::DryRun
            } else {
                match fs::remove_dir(&target) {
                    Ok(()) => PanicOutcome::Done,
                    Err(e) => PanicOutcome::Failed(e.to_string()),
                }
            };
            report.record(phase, &target, outcome);
        }
    }

    fn shred(&self, target: &Path) -> PanicOutcome {
        if self.dry_run {
            return PanicOutcome::DryRun;
        }
        match vault::shred_file(target) {
            Ok(()) => PanicOutcome::Done,
            Err(e) => PanicOutcome::Failed(e.to_string()),
        }
    }
}

/// All regular files below a directory. A missing directory is empty.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}
