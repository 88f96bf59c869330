//! Commands for Nextcloud's administrative CLI, `occ`.
//!
//! Every `occ` call runs as the service account from inside the install directory:
//! `sudo -u <user> <php> <install>/occ <args>`. [`Occ`] only builds the
//! [`CommandSpec`]s; running them is left to the caller's runner so that every call is
//! logged like any other command.

use std::path::{Path, PathBuf};

use crate::config::UpdaterConfig;
use crate::process::CommandSpec;

/// Substring of `occ status` output reporting an active maintenance mode.
pub const MAINTENANCE_ACTIVE_MARKER: &str = "maintenance: true";

/// Post-upgrade repair command and whether its failure is tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairStep {
    /// The `occ` invocation
    pub command: CommandSpec,
    /// Failure is logged as a warning instead of ending the run
    pub tolerate_failure: bool,
}

/// Builder for `occ` invocations against one installation.
#[derive(Debug, Clone)]
pub struct Occ {
    install_dir: PathBuf,
    php: String,
    user: String,
}

impl Occ {
    /// `occ` of the install described by `config`.
    #[must_use]
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self::new(&config.install_dir, &config.php_binary, &config.service_user)
    }

    #[must_use]
    pub fn new(install_dir: &Path, php: &str, user: &str) -> Self {
        Self {
            install_dir: install_dir.to_path_buf(),
            php: php.to_string(),
            user: user.to_string(),
        }
    }

    /// Arbitrary `occ` subcommand.
    #[must_use]
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(&self.php)
            .path_arg(self.install_dir.join("occ"))
            .args(args)
            .current_dir(&self.install_dir)
            .run_as(&self.user)
    }

    #[must_use]
    pub fn status(&self) -> CommandSpec {
        self.command(["status"])
    }

    #[must_use]
    pub fn maintenance_on(&self) -> CommandSpec {
        self.command(["maintenance:mode", "--on"])
    }

    #[must_use]
    pub fn maintenance_off(&self) -> CommandSpec {
        self.command(["maintenance:mode", "--off"])
    }

    #[must_use]
    pub fn upgrade(&self) -> CommandSpec {
        self.command(["upgrade"])
    }

    /// The optional repair commands in the order they run.
    ///
    /// Adding missing primary keys can fail on large or legacy databases without harm,
    /// so that step alone is tolerated.
    #[must_use]
    pub fn repair_sequence(&self) -> Vec<RepairStep> {
        [
            ("db:add-missing-indices", false),
            ("db:add-missing-columns", false),
            ("db:add-missing-primary-keys", true),
            ("maintenance:repair", false),
        ]
        .into_iter()
        .map(|(subcommand, tolerate_failure)| RepairStep {
            command: self.command([subcommand]),
            tolerate_failure,
        })
        .collect()
    }
}

/// Whether `occ status` output reports maintenance mode as active.
#[must_use]
pub fn is_maintenance_enabled(status_output: &str) -> bool {
    status_output.contains(MAINTENANCE_ACTIVE_MARKER)
}
