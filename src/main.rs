// gvault - local offline file vault
//
// Encryption: AES-256-GCM with role-labeled associated data
// Key Derivation: Argon2id (PBKDF2-HMAC-SHA512 fallback)
// Authentication: triple-password store with cryptographic-erasure panic
// Backups: encrypted, compressed, manifest-verified archives

use std::process;

use gvault::cli::Cli;

/// Entry point for the gvault tool.
///
/// # Exit Codes
/// * 0 - Success
/// * 1 - Error (message printed to stderr)
fn main() {
    if let Err(e) = Cli::init().and_then(Cli::execute) {
        eprintln!("Error: {e:?}");
        process::exit(1);
    }
}
