//! Command-line interface for nc-update
//!
//! `nc-update` takes no subcommands: every decision after startup is made at an
//! interactive prompt. The flags only choose the configuration file and how much
//! diagnostic `tracing` output goes to stderr. The run log and the phase output on
//! stdout are unaffected by `--quiet`.
//!
//! # Examples
//!
//! ```bash
//! sudo nc-update
//! sudo nc-update --config /root/nc-updater.toml
//! sudo RUST_LOG=nc_updater=trace nc-update
//! sudo nc-update --verbose
//! ```

pub mod prompt;

pub use prompt::{Prompter, TerminalPrompter};

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::UpdaterConfig;
use crate::process::SystemRunner;
use crate::updater::{HttpFetcher, Updater};

/// Interactive, step-gated updater for a self-hosted Nextcloud installation.
#[derive(Parser, Debug)]
#[command(
    name = "nc-update",
    about = "Interactive, step-gated updater for a self-hosted Nextcloud installation",
    version,
    long_about = "Downloads a Nextcloud release, backs up the installation, synchronizes the new \
                  files while preserving config and data, fixes ownership and runs occ upgrade. \
                  Every phase is confirmed interactively and logged to a timestamped file. \
                  Must run as root."
)]
pub struct Cli {
    /// Configuration file (overrides NC_UPDATER_CONFIG and the default locations).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show debug diagnostics on stderr.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors in diagnostics on stderr.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Diagnostic filter: `--verbose` and `--quiet` win over `RUST_LOG`, which wins over
    /// the `warn` default.
    #[must_use]
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    }

    /// Install the `tracing` subscriber writing diagnostics to stderr.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .try_init();
    }

    /// Load the configuration and run the update.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the run; see
    /// [`exit_code_for`](crate::core::exit_code_for) for how it maps to an exit status.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let (config, source) = UpdaterConfig::load(self.config).await?;
        match &source {
            Some(path) => debug!("Loaded configuration from {}", path.display()),
            None => debug!("No configuration file found, using built-in defaults"),
        }

        let fetcher = HttpFetcher::new()?;
        let updater = Updater::new(&config, SystemRunner, TerminalPrompter::new(), fetcher);
        let log_path = config.log_path(updater.stamp());

        let interrupted = async {
            // Without a signal handler the run can only end at a prompt
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        match updater.run_until(interrupted).await {
            Ok(summary) => {
                println!();
                println!(
                    "{} Nextcloud {} installed. Backup: {}",
                    "✓".green().bold(),
                    summary.version,
                    summary.backup_dir.display()
                );
                Ok(())
            }
            Err(e) => {
                if log_path.exists() {
                    eprintln!("{} {}", "Run log:".bold(), log_path.display());
                }
                Err(e)
            }
        }
    }
}
