//! Command-line interface.
//!
//! Thin driver over the core: every subcommand acquires the vault lock,
//! runs one core operation, and renders the result. The `open` command
//! deliberately reports a panic classification exactly as it reports an
//! invalid password.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::backup::{self, CreateOptions};
use crate::config::APP_NAME;
use crate::kdf::{self, KdfParams};
use crate::panic::PanicExecutor;
use crate::progress::{CancelToken, NullSink};
use crate::store::{Classification, PasswordStore};
use crate::ui::{self, TermProgress, prompt};
use crate::vault::VaultRoot;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new vault: benchmark the KDF and set all three
    /// passwords.
    Init {
        #[arg(short, long)]
        vault: PathBuf,
    },

    /// Unlock a vault with a password.
    Open {
        #[arg(short, long)]
        vault: PathBuf,
    },

    /// Write an encrypted backup of the vault's data tree.
    Backup {
        #[arg(short, long)]
        vault: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Skip the post-write manifest round-trip.
        #[arg(long)]
        skip_verify: bool,
    },

    /// Verify a backup file without restoring it.
    Verify {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Restore a backup into a vault root.
    Restore {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        vault: PathBuf,
    },

    /// Destroy a vault, or rehearse the destruction with --dry-run.
    Panic {
        #[arg(short, long)]
        vault: PathBuf,

        /// Log every intended action instead of performing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-run the KDF benchmark and print the chosen parameters.
    Bench,
}

#[derive(Parser)]
#[command(name = "gvault", version, about = "Local offline file vault: AEAD storage, triple-password authentication, cryptographic erasure, encrypted backups.")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Installs the tracing subscriber and parses the command line.
    pub fn init() -> Result<Self> {
        let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(Self::parse())
    }

    /// Runs the selected subcommand.
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init { vault } => Self::run_init(&VaultRoot::new(vault)),
            Commands::Open { vault } => Self::run_open(&VaultRoot::new(vault)),
            Commands::Backup { vault, output, skip_verify } => {
                Self::run_backup(&VaultRoot::new(vault), &output, skip_verify)
            }
            Commands::Verify { file } => Self::run_verify(&file),
            Commands::Restore { file, vault } => Self::run_restore(&file, &VaultRoot::new(vault)),
            Commands::Panic { vault, dry_run } => Self::run_panic(&VaultRoot::new(vault), dry_run),
            Commands::Bench => Self::run_bench(),
        }
    }

    fn run_init(root: &VaultRoot) -> Result<()> {
        let _lock = root.lock()?;
        if PasswordStore::is_configured(root) {
            bail!("vault already initialized: {}", root.path().display());
        }
        root.init_layout()?;

        println!("Benchmarking key derivation for this host...");
        let params = kdf::bench()?;
        ui::show_kdf_params(&params);

        let master = prompt::prompt_new_password("Master password:")?;
        let decoy = prompt::prompt_new_password("Decoy password:")?;
        let panic = prompt::prompt_new_password("Panic password:")?;

        PasswordStore::create(root, &master, &decoy, &panic, params)
            .context("failed to create the password store")?;

        println!("Vault initialized at {}", root.path().display());
        Ok(())
    }

    fn run_open(root: &VaultRoot) -> Result<()> {
        let _lock = root.lock()?;
        let store = PasswordStore::load(root).context("vault is not initialized")?;

        let password = prompt::prompt_password("Password:")?;

        match store.classify(&password) {
            Classification::Master(_key) | Classification::Decoy(_key) => {
                println!("Vault unlocked.");
                Ok(())
            }
            Classification::Panic => {
                // Indistinguishable from an invalid attempt: destruction
                // runs with no output of its own, then the login fails.
                let _ = PanicExecutor::new(false).execute(root, &CancelToken::new(), &NullSink);
                bail!("invalid password");
            }
            Classification::Invalid => bail!("invalid password"),
        }
    }

    fn run_backup(root: &VaultRoot, output: &PathBuf, skip_verify: bool) -> Result<()> {
        let _lock = root.lock()?;
        let password = prompt::prompt_new_password("Backup password:")?;

        let opts = CreateOptions { skip_verify, ..CreateOptions::default() };
        let progress = TermProgress::new();
        let info = backup::create(root, output, &password, &opts, &CancelToken::new(), &progress)
            .context("backup failed")?;
        progress.finish();

        println!("Backup written to {}", output.display());
        ui::show_backup_info(&info);
        Ok(())
    }

    fn run_verify(file: &PathBuf) -> Result<()> {
        let password = prompt::prompt_password("Backup password:")?;

        let info = backup::verify(file, &password).context("backup verification failed")?;
        ui::show_backup_info(&info);
        Ok(())
    }

    fn run_restore(file: &PathBuf, root: &VaultRoot) -> Result<()> {
        let _lock = root.lock()?;
        let password = prompt::prompt_password("Backup password:")?;

        let progress = TermProgress::new();
        backup::restore(file, root, &password, &CancelToken::new(), &progress)
            .context("restore failed")?;
        progress.finish();

        println!("Restored into {}", root.path().display());
        Ok(())
    }

    fn run_panic(root: &VaultRoot, dry_run: bool) -> Result<()> {
        let _lock = root.lock()?;

        if !dry_run
            && !prompt::confirm("This permanently destroys the vault and every key. Continue?")?
        {
            bail!("operation canceled");
        }

        let report = PanicExecutor::new(dry_run)
            .execute(root, &CancelToken::new(), &NullSink)
            .context("key destruction failed; retry until it succeeds")?;

        ui::show_panic_report(&report);
        Ok(())
    }

    fn run_bench() -> Result<()> {
        println!("Benchmarking key derivation for {APP_NAME}...");
        let params: KdfParams = kdf::bench()?;
        ui::show_kdf_params(&params);
        Ok(())
    }
}
