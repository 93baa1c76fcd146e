//! Terminal front-end helpers for the CLI.
//!
//! The core never renders text; everything user-facing lives here.

pub mod progress;
pub mod prompt;

pub use progress::TermProgress;

use crate::backup::BackupInfo;
use crate::kdf::KdfParams;
use crate::panic::{PanicOutcome, PanicReport};

/// Prints a backup/verify summary.
pub fn show_backup_info(info: &BackupInfo) {
    println!("valid:    {}", info.valid);
    println!("version:  {}", info.version);
    println!("created:  {}", info.creation_date);
    println!("files:    {}", info.file_count);
    println!("size:     {} bytes", info.total_size);
}

/// Prints the chosen KDF parameters after a benchmark.
pub fn show_kdf_params(params: &KdfParams) {
    println!("algorithm:   {:?}", params.algorithm);
    println!("memory:      {} KiB", params.mem_kib);
    println!("passes:      {}", params.passes);
    println!("parallelism: {}", params.parallelism);
}

/// Prints a panic report, one line per action.
pub fn show_panic_report(report: &PanicReport) {
    for entry in &report.entries {
        let outcome = match &entry.outcome {
            PanicOutcome::Done => "done".to_owned(),
            PanicOutcome::DryRun => "dry-run".to_owned(),
            PanicOutcome::Failed(reason) => format!("FAILED: {reason}"),
        };
        println!("{:<18} {:<50} {outcome}", entry.phase.label(), entry.target.display());
    }
    if report.cancelled {
        println!("(cancelled after key destruction)");
    }
}
