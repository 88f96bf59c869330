use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::config::UpdaterConfig;
use crate::core::RunStamp;
use crate::process::{CommandRunner, CommandSpec, LoggedRunner};
use crate::utils::relative_inside;

/// Takes the pre-upgrade backup of a Nextcloud installation.
///
/// The backup lives in `<backup_root>/nextcloud-<stamp>/` and consists of two verbose,
/// attribute-preserving copies made with `cp -av`:
///
/// - the whole install tree, as `<install-dir-name>/`
/// - the configuration subtree again, as `config/`, so the one directory an operator
///   most often needs is at a predictable location
///
/// The data directory is not part of the backup. When it lies inside the install tree,
/// the tree copy is made with `rsync -aAv` and an anchored exclude instead, so user data
/// never lands in the backup root. Backups are never removed by the updater; restoring
/// one is a manual operation.
///
/// # Examples
///
/// ```rust
/// use nc_updater::config::UpdaterConfig;
/// use nc_updater::core::RunStamp;
/// use nc_updater::updater::BackupManager;
///
/// let config = UpdaterConfig::default();
/// let backup = BackupManager::new(&config, &RunStamp::now());
///
/// assert!(backup.backup_dir().starts_with("/var/backups/nextcloud"));
/// assert_eq!(backup.commands().len(), 2);
/// ```
pub struct BackupManager {
    /// Installation being backed up.
    install_dir: PathBuf,
    /// Its configuration subtree.
    config_dir: PathBuf,
    /// Data directory relative to the install tree, when it lives inside it.
    data_subtree: Option<PathBuf>,
    /// Directory created for this run.
    backup_dir: PathBuf,
}

impl BackupManager {
    #[must_use]
    pub fn new(config: &UpdaterConfig, stamp: &RunStamp) -> Self {
        Self {
            install_dir: config.install_dir.clone(),
            config_dir: config.config_subtree(),
            data_subtree: relative_inside(&config.install_dir, &config.data_dir),
            backup_dir: config.backup_dir(stamp),
        }
    }

    /// Directory holding this run's backup.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// The copy commands, in execution order.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandSpec> {
        vec![self.tree_copy(), self.config_copy()]
    }

    fn tree_copy(&self) -> CommandSpec {
        match &self.data_subtree {
            Some(data) => {
                let name = self.install_dir.file_name().unwrap_or_else(|| OsStr::new("nextcloud"));
                let mut source = self.install_dir.clone().into_os_string();
                source.push("/");
                CommandSpec::new("rsync")
                    .arg("-aAv")
                    .arg(format!("--exclude=/{}/", data.display()))
                    .path_arg(source)
                    .path_arg(self.backup_dir.join(name))
            }
            None => {
                // Trailing separator: copy the install directory *into* the backup directory
                let mut into_backup = self.backup_dir.clone().into_os_string();
                into_backup.push("/");
                CommandSpec::new("cp").arg("-av").path_arg(&self.install_dir).path_arg(into_backup)
            }
        }
    }

    fn config_copy(&self) -> CommandSpec {
        CommandSpec::new("cp")
            .arg("-av")
            .path_arg(&self.config_dir)
            .path_arg(self.backup_dir.join("config"))
    }

    /// Create the backup directory and run both copies.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or either copy fails.
    pub async fn create_backup<R: CommandRunner>(&self, exec: &LoggedRunner<'_, R>) -> Result<()> {
        debug!("Creating backup in {}", self.backup_dir.display());
        fs::create_dir_all(&self.backup_dir).await.with_context(|| {
            format!("Failed to create backup directory: {}", self.backup_dir.display())
        })?;
        exec.log().info(&format!("Backup directory: {}", self.backup_dir.display()));

        for command in self.commands() {
            exec.run_and_check(&command).await?;
        }
        Ok(())
    }
}
