//! The update orchestrator.
//!
//! An [`Updater`] drives one interactive update of a Nextcloud installation through
//! thirteen phases, strictly in order:
//!
//! 1. Preflight: root check, install and data directories, required tools, run log
//! 2. Version resolution, including what to do with an archive already on disk
//! 3. Plan announcement and acknowledgment
//! 4. Download
//! 5. Maintenance mode on
//! 6. Backup
//! 7. Extraction
//! 8. Synchronization
//! 9. Ownership fix
//! 10. `occ upgrade`
//! 11. Optional repair commands
//! 12. Maintenance mode off
//! 13. Final report
//!
//! Phases 4 to 10 and 12 are preceded by a "press Enter" gate unless
//! `confirm_each_phase` is disabled. Ending input at any prompt aborts the run.
//!
//! # Failure handling
//!
//! Preflight failures end the run immediately; nothing has been changed yet. Once
//! preflight has passed, every exit route (success, failure, interrupt) goes through the
//! [`MaintenanceGuard`], which switches maintenance mode off if it is still active. There
//! is no rollback: the backup taken in phase 6 is the recovery path.
//!
//! # Examples
//!
//! ```rust,no_run
//! use nc_updater::cli::TerminalPrompter;
//! use nc_updater::config::UpdaterConfig;
//! use nc_updater::process::SystemRunner;
//! use nc_updater::updater::{HttpFetcher, Updater};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::default();
//! let fetcher = HttpFetcher::new()?;
//! let updater = Updater::new(&config, SystemRunner, TerminalPrompter::new(), fetcher);
//! let summary = updater.run_until(tokio::signal::ctrl_c()).await?;
//! println!("Backup kept at {}", summary.backup_dir.display());
//! # Ok(())
//! # }
//! ```

mod backup;
mod download;
mod extract;
mod guard;
mod preflight;
mod sync;


pub use backup::BackupManager;
pub use download::{ArchiveFetcher, ArchivePlan, HttpFetcher, format_size};
pub use extract::extract_release;
pub use guard::MaintenanceGuard;
pub use preflight::REQUIRED_TOOLS;
pub use sync::{PRESERVED_PATHS, SyncPlan};

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::cli::prompt::{Prompter, acknowledge, ask_with_default, confirm};
use crate::config::UpdaterConfig;
use crate::core::{RunStamp, UpdaterError};
use crate::occ::Occ;
use crate::process::{CommandRunner, CommandSpec, LoggedRunner};
use crate::utils::{RunLog, command_exists};

/// Number of phases shown in banners.
pub const TOTAL_PHASES: usize = 13;

/// What a completed run did and left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Version that was installed
    pub version: String,
    /// Release archive in the temp directory
    pub archive: PathBuf,
    /// Whether the archive was downloaded by this run
    pub archive_downloaded: bool,
    /// Extracted release tree in the temp directory
    pub extracted_dir: PathBuf,
    /// Backup taken before the upgrade
    pub backup_dir: PathBuf,
    /// Run log
    pub log_path: PathBuf,
    /// Whether the optional repair commands ran
    pub repairs_run: bool,
}

/// Interactive updater for one Nextcloud installation.
pub struct Updater<'a, R, P, F> {
    config: &'a UpdaterConfig,
    runner: R,
    prompter: P,
    fetcher: F,
    tool_lookup: fn(&str) -> bool,
    echo: bool,
    stamp: RunStamp,
}

impl<'a, R, P, F> Updater<'a, R, P, F>
where
    R: CommandRunner,
    P: Prompter,
    F: ArchiveFetcher,
{
    pub fn new(config: &'a UpdaterConfig, runner: R, prompter: P, fetcher: F) -> Self {
        Self {
            config,
            runner,
            prompter,
            fetcher,
            tool_lookup: command_exists,
            echo: true,
            stamp: RunStamp::now(),
        }
    }

    /// Replace the `PATH` lookup used to discover required tools.
    #[must_use]
    pub fn with_tool_lookup(mut self, lookup: fn(&str) -> bool) -> Self {
        self.tool_lookup = lookup;
        self
    }

    /// Use a fixed run stamp instead of the current time.
    #[must_use]
    pub fn with_stamp(mut self, stamp: RunStamp) -> Self {
        self.stamp = stamp;
        self
    }

    /// Keep run-log lines off the terminal.
    #[must_use]
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Stamp naming this run's log file and backup directory.
    pub const fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    /// The command runner, for inspecting what ran.
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Run all phases without an external interrupt source.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run all phases, aborting with [`UpdaterError::Interrupted`] if `interrupt`
    /// completes first.
    ///
    /// An interrupt drops the phase in progress, which kills any command it is running.
    /// Once preflight has passed the [`MaintenanceGuard`] runs on every exit route.
    ///
    /// # Errors
    ///
    /// Returns the [`UpdaterError`] that ended the run, or any other error wrapped in
    /// `anyhow` context.
    pub async fn run_until<I: Future>(&self, interrupt: I) -> Result<RunSummary> {
        tokio::pin!(interrupt);

        let log = tokio::select! {
            biased;
            _ = &mut interrupt => return Err(UpdaterError::Interrupted.into()),
            log = self.preflight() => log?,
        };

        let exec = LoggedRunner::new(&self.runner, &log);
        let occ = Occ::from_config(self.config);

        let outcome = tokio::select! {
            biased;
            _ = &mut interrupt => Err(UpdaterError::Interrupted.into()),
            result = self.run_phases(&exec, &occ) => result,
        };

        if let Err(e) = &outcome {
            report_failure(&log, e);
        }

        MaintenanceGuard::new(LoggedRunner::new(&self.runner, &log), &occ).release().await;
        outcome
    }

    /// Phase 1. Nothing on the host changes until every check has passed.
    async fn preflight(&self) -> Result<RunLog> {
        preflight::ensure_root(&self.runner).await?;
        preflight::ensure_directories(self.config).await?;
        preflight::ensure_tools(self.config, self.tool_lookup)?;

        let mut log = RunLog::create(self.config.log_path(&self.stamp))?;
        if !self.echo {
            log = log.without_echo();
        }

        log.banner(1, TOTAL_PHASES, "Preflight");
        log.info(&format!(
            "{} {} run {} started at {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.stamp,
            self.stamp.started_at().format("%Y-%m-%d %H:%M:%S %:z")
        ));
        log.info(&format!("Install directory: {}", self.config.install_dir.display()));
        log.info(&format!("Data directory: {}", self.config.data_dir.display()));
        log.info(&format!(
            "Service account: {} (php: {})",
            self.config.ownership(),
            self.config.php_binary
        ));
        log.info(&format!("Log file: {}", log.path().display()));
        log.success("Preflight checks passed.");
        Ok(log)
    }

    async fn run_phases(&self, exec: &LoggedRunner<'_, R>, occ: &Occ) -> Result<RunSummary> {
        let log = exec.log();
        let config = self.config;

        log.banner(2, TOTAL_PHASES, "Version");
        let version =
            ask_with_default(&self.prompter, "Nextcloud version to install", &config.default_version)
                .await?;
        log.info(&format!("Target version: {version}"));
        let archive = config.archive_path(&version);
        let archive_plan = self.archive_plan(&archive).await?;

        log.banner(3, TOTAL_PHASES, "Plan");
        let backup = BackupManager::new(config, &self.stamp);
        let extracted_dir = config.extracted_dir();
        for line in self.plan_lines(&version, &archive, archive_plan, backup.backup_dir()) {
            log.info(&line);
        }
        acknowledge(&self.prompter, "Review the plan above.").await?;

        self.gate("download").await?;
        log.banner(4, TOTAL_PHASES, "Download");
        self.download(log, &version, &archive, archive_plan).await?;

        self.gate("enable maintenance mode").await?;
        log.banner(5, TOTAL_PHASES, "Maintenance mode on");
        exec.run_and_check(&occ.maintenance_on()).await?;

        self.gate("backup").await?;
        log.banner(6, TOTAL_PHASES, "Backup");
        backup.create_backup(exec).await?;
        log.success(&format!("Backup written to {}", backup.backup_dir().display()));

        self.gate("extract the release").await?;
        log.banner(7, TOTAL_PHASES, "Extract");
        log.info(&format!("Extracting {} into {}", archive.display(), config.temp_dir.display()));
        let extracted = extract_release(&archive, &config.temp_dir).await?;
        log.success(&format!("Release extracted to {}", extracted.display()));

        self.gate("synchronize files").await?;
        log.banner(8, TOTAL_PHASES, "Synchronize");
        exec.run_and_check(&SyncPlan::new(config, &extracted).command()).await?;

        self.gate("fix ownership").await?;
        log.banner(9, TOTAL_PHASES, "Ownership");
        exec.run_and_check(&chown_command(config)).await?;

        self.gate("run occ upgrade").await?;
        log.banner(10, TOTAL_PHASES, "Upgrade");
        exec.run_and_check(&occ.upgrade()).await?;
        log.success("occ upgrade finished.");

        log.banner(11, TOTAL_PHASES, "Repair");
        let repairs_run = self.repair(exec, occ).await?;

        self.gate("disable maintenance mode").await?;
        log.banner(12, TOTAL_PHASES, "Maintenance mode off");
        exec.run_and_check(&occ.maintenance_off()).await?;
        exec.run_and_check(&occ.status()).await?;

        log.banner(13, TOTAL_PHASES, "Done");
        let summary = RunSummary {
            version,
            archive,
            archive_downloaded: archive_plan.downloads(),
            extracted_dir,
            backup_dir: backup.backup_dir().to_path_buf(),
            log_path: log.path().to_path_buf(),
            repairs_run,
        };
        report_success(log, &summary);
        Ok(summary)
    }

    /// Decide what to do about an archive already at the download destination.
    async fn archive_plan(&self, archive: &Path) -> Result<ArchivePlan> {
        if fs::symlink_metadata(archive).await.is_err() {
            return Ok(ArchivePlan::Download);
        }
        if !self.config.reuse_existing_archive {
            return Ok(ArchivePlan::Replace);
        }

        let question = format!("{} already exists. Remove it and download again?", archive.display());
        Ok(if confirm(&self.prompter, &question, true).await? {
            ArchivePlan::Replace
        } else {
            ArchivePlan::ReuseExisting
        })
    }

    fn plan_lines(
        &self,
        version: &str,
        archive: &Path,
        archive_plan: ArchivePlan,
        backup_dir: &Path,
    ) -> Vec<String> {
        let config = self.config;
        let download = match archive_plan {
            ArchivePlan::ReuseExisting => format!("Reuse existing archive {}", archive.display()),
            ArchivePlan::Replace | ArchivePlan::Download => format!(
                "Download {} to {}",
                config.download_url(version),
                archive.display()
            ),
        };

        vec![
            format!("Update {} to Nextcloud {version}:", config.install_dir.display()),
            format!("   4. {download}"),
            "   5. Enable maintenance mode".to_string(),
            format!(
                "   6. Back up {} and its config to {}",
                config.install_dir.display(),
                backup_dir.display()
            ),
            format!("   7. Extract the archive into {}", config.extracted_dir().display()),
            format!(
                "   8. Synchronize {}/ onto {}/ preserving {}",
                config.extracted_dir().display(),
                config.install_dir.display(),
                PRESERVED_PATHS.join(", ")
            ),
            format!("   9. Set ownership of {} to {}", config.install_dir.display(), config.ownership()),
            "  10. Run occ upgrade".to_string(),
            "  11. Optionally run the database repair commands".to_string(),
            "  12. Disable maintenance mode".to_string(),
        ]
    }

    /// Per-phase "press Enter" checkpoint.
    async fn gate(&self, next: &str) -> Result<()> {
        if self.config.confirm_each_phase {
            acknowledge(&self.prompter, &format!("Next: {next}.")).await?;
        }
        Ok(())
    }

    /// Phase 4.
    async fn download(
        &self,
        log: &RunLog,
        version: &str,
        archive: &Path,
        plan: ArchivePlan,
    ) -> Result<()> {
        match plan {
            ArchivePlan::ReuseExisting => {
                log.info(&format!("Using existing archive {}", archive.display()));
            }
            ArchivePlan::Replace => {
                log.info(&format!("Removing stale archive {}", archive.display()));
                fs::remove_file(archive)
                    .await
                    .with_context(|| format!("Failed to remove {}", archive.display()))?;
                self.fetch(log, version, archive).await?;
            }
            ArchivePlan::Download => self.fetch(log, version, archive).await?,
        }

        let size = fs::metadata(archive)
            .await
            .with_context(|| format!("Archive missing after download: {}", archive.display()))?
            .len();
        log.info(&format!("Archive size: {} ({size} bytes)", format_size(size)));
        Ok(())
    }

    async fn fetch(&self, log: &RunLog, version: &str, archive: &Path) -> Result<()> {
        let url = self.config.download_url(version);
        log.info(&format!("Downloading {url}"));
        fs::create_dir_all(&self.config.temp_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.config.temp_dir.display()))?;

        match self.fetcher.fetch(&url, archive).await {
            Ok(written) => {
                debug!("Downloaded {} bytes from {}", written, url);
                log.success(&format!("Downloaded {}", archive.display()));
                Ok(())
            }
            Err(e) => Err(UpdaterError::DownloadFailed {
                url,
                reason: format!("{e:#}"),
            }
            .into()),
        }
    }

    /// Phase 11. Returns whether the repair commands ran.
    async fn repair(&self, exec: &LoggedRunner<'_, R>, occ: &Occ) -> Result<bool> {
        let run = confirm(
            &self.prompter,
            "Run the database repair commands (missing indices, columns, primary keys, repair)?",
            true,
        )
        .await?;
        if !run {
            exec.log().info("Skipping repair commands.");
            return Ok(false);
        }

        for step in occ.repair_sequence() {
            if step.tolerate_failure {
                exec.run_tolerant(&step.command).await;
            } else {
                exec.run_and_check(&step.command).await?;
            }
        }
        exec.log().success("Repair commands finished.");
        Ok(true)
    }
}

fn chown_command(config: &UpdaterConfig) -> CommandSpec {
    CommandSpec::new("chown").arg("-R").arg(config.ownership()).path_arg(&config.install_dir)
}

fn report_success(log: &RunLog, summary: &RunSummary) {
    log.success(&format!("Nextcloud updated to {}.", summary.version));
    log.info(&format!("Backup: {}", summary.backup_dir.display()));
    log.info(&format!("Log file: {}", summary.log_path.display()));
    log.info(&format!(
        "The archive {} and the extracted tree {} were left in place; remove them when no longer needed.",
        summary.archive.display(),
        summary.extracted_dir.display()
    ));
}

fn report_failure(log: &RunLog, error: &anyhow::Error) {
    match error.downcast_ref::<UpdaterError>() {
        // Already logged by the command wrapper
        Some(UpdaterError::CommandFailed { .. }) => {}
        Some(UpdaterError::Interrupted) => log.error("Interrupted; aborting the update."),
        _ => log.error(&format!("{error:#}")),
    }
}
