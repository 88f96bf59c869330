//! Updater configuration loaded once at startup.
//!
//! The configuration is a TOML file whose every key is optional; anything left out falls
//! back to the defaults of a stock Debian/Ubuntu Nextcloud install. The loaded
//! [`UpdaterConfig`] is immutable and handed by reference to every phase; the only value
//! decided interactively (the target version) lives next to it in the run, not inside it.
//!
//! # Lookup order
//!
//! 1. The `--config` command-line flag
//! 2. The `NC_UPDATER_CONFIG` environment variable
//! 3. `/etc/nc-updater/config.toml`
//! 4. `<user config dir>/nc-updater/config.toml`
//!
//! If none of these exist the built-in defaults are used. An explicitly requested file
//! (flag or environment variable) that does not exist is an error.
//!
//! # Example
//!
//! ```toml
//! default_version = "31.0.9"
//! install_dir = "/srv/www/nextcloud"
//! data_dir = "/srv/ncdata"
//! service_user = "nginx"
//! service_group = "nginx"
//! backup_root = "~/nextcloud-backups"
//! confirm_each_phase = false
//! ```

use crate::core::{RunStamp, UpdaterError};
use anyhow::Result;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "NC_UPDATER_CONFIG";

/// System-wide configuration file location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/nc-updater/config.toml";

/// Placeholder substituted with the requested version in [`UpdaterConfig::url_template`].
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Name of the directory a Nextcloud release archive extracts to.
pub const EXTRACTED_DIR_NAME: &str = "nextcloud";

/// Immutable settings for one update run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdaterConfig {
    /// Version offered at the version prompt.
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Download URL with a `{version}` placeholder.
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Live Nextcloud installation (the directory containing `occ`).
    #[serde(default = "default_install_dir", deserialize_with = "expand_path")]
    pub install_dir: PathBuf,

    /// Nextcloud data directory. Never backed up or synchronized.
    #[serde(default = "default_data_dir", deserialize_with = "expand_path")]
    pub data_dir: PathBuf,

    /// Account owning the install tree and running `occ`.
    #[serde(default = "default_service_user")]
    pub service_user: String,

    /// Group assigned together with [`service_user`](Self::service_user).
    #[serde(default = "default_service_user")]
    pub service_group: String,

    /// PHP interpreter used to run `occ`.
    #[serde(default = "default_php_binary")]
    pub php_binary: String,

    /// Where the archive is downloaded and extracted.
    #[serde(default = "default_temp_dir", deserialize_with = "expand_path")]
    pub temp_dir: PathBuf,

    /// Parent of the per-run backup directories.
    #[serde(default = "default_backup_root", deserialize_with = "expand_path")]
    pub backup_root: PathBuf,

    /// Directory receiving the per-run log files.
    #[serde(default = "default_log_dir", deserialize_with = "expand_path")]
    pub log_dir: PathBuf,

    /// Offer to keep an archive already present in the temp directory.
    ///
    /// When `false`, a stale archive is always replaced by a fresh download.
    #[serde(default = "default_true")]
    pub reuse_existing_archive: bool,

    /// Stop at a "press Enter to continue" gate before every phase.
    #[serde(default = "default_true")]
    pub confirm_each_phase: bool,
}

fn default_version() -> String {
    "31.0.9".to_string()
}

fn default_url_template() -> String {
    "https://download.nextcloud.com/server/releases/nextcloud-{version}.zip".to_string()
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("/var/www/nextcloud")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/www/nextcloud/data")
}

fn default_service_user() -> String {
    "www-data".to_string()
}

fn default_php_binary() -> String {
    "php".to_string()
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_backup_root() -> PathBuf {
    PathBuf::from("/var/backups/nextcloud")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/nc-updater")
}

const fn default_true() -> bool {
    true
}

/// Expand `~` and `$VARS` in configured paths.
fn expand_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let expanded = shellexpand::full(&raw)
        .map_err(|e| serde::de::Error::custom(format!("cannot expand path '{raw}': {e}")))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            default_version: default_version(),
            url_template: default_url_template(),
            install_dir: default_install_dir(),
            data_dir: default_data_dir(),
            service_user: default_service_user(),
            service_group: default_service_user(),
            php_binary: default_php_binary(),
            temp_dir: default_temp_dir(),
            backup_root: default_backup_root(),
            log_dir: default_log_dir(),
            reuse_existing_archive: true,
            confirm_each_phase: true,
        }
    }
}

impl UpdaterConfig {
    /// Load the configuration following the lookup order described in the module docs.
    ///
    /// Returns the configuration and the file it came from, if any.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ConfigError`] if an explicitly requested file is missing, a
    /// file cannot be read or parsed, or the result fails [`validate`](Self::validate).
    pub async fn load(explicit: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        let explicit = explicit.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(UpdaterError::ConfigError {
                    message: format!("configuration file not found: {}", path.display()),
                }
                .into());
            }
            let config = Self::load_from(&path).await?;
            return Ok((config, Some(path)));
        }

        for candidate in Self::default_paths() {
            if candidate.exists() {
                let config = Self::load_from(&candidate).await?;
                return Ok((config, Some(candidate)));
            }
        }

        debug!("No configuration file found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok((config, None))
    }

    /// Load and validate a specific configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ConfigError`] if the file cannot be read, parsed or validated.
    pub async fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).await.map_err(|e| UpdaterError::ConfigError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let config = Self::parse(&content).map_err(|e| UpdaterError::ConfigError {
            message: format!("{}: {e}", path.display()),
        })?;
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first syntax or validation problem.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Candidate locations checked when no explicit path is given.
    #[must_use]
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("nc-updater").join("config.toml"));
        }
        paths
    }

    /// Check invariants the phases rely on.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ConfigError`] naming the offending key.
    pub fn validate(&self) -> Result<(), UpdaterError> {
        let fail = |message: String| Err(UpdaterError::ConfigError {
            message,
        });

        if self.default_version.trim().is_empty() {
            return fail("default_version must not be empty".to_string());
        }
        if !self.url_template.contains(VERSION_PLACEHOLDER) {
            return fail(format!("url_template must contain '{VERSION_PLACEHOLDER}'"));
        }
        for (key, path) in [
            ("install_dir", &self.install_dir),
            ("data_dir", &self.data_dir),
            ("temp_dir", &self.temp_dir),
            ("backup_root", &self.backup_root),
            ("log_dir", &self.log_dir),
        ] {
            if !path.is_absolute() {
                return fail(format!("{key} must be an absolute path, got {}", path.display()));
            }
        }
        if self.install_dir.parent().is_none() {
            return fail("install_dir must not be the filesystem root".to_string());
        }
        if self.service_user.trim().is_empty() || self.service_group.trim().is_empty() {
            return fail("service_user and service_group must not be empty".to_string());
        }
        if self.php_binary.trim().is_empty() {
            return fail("php_binary must not be empty".to_string());
        }
        Ok(())
    }

    /// Download URL for `version`.
    #[must_use]
    pub fn download_url(&self, version: &str) -> String {
        self.url_template.replace(VERSION_PLACEHOLDER, version)
    }

    /// Where the archive for `version` is stored.
    #[must_use]
    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.temp_dir.join(format!("nextcloud-{version}.zip"))
    }

    /// Top-level directory produced by extracting a release archive.
    #[must_use]
    pub fn extracted_dir(&self) -> PathBuf {
        self.temp_dir.join(EXTRACTED_DIR_NAME)
    }

    /// Backup directory for the run identified by `stamp`.
    #[must_use]
    pub fn backup_dir(&self, stamp: &RunStamp) -> PathBuf {
        self.backup_root.join(format!("nextcloud-{stamp}"))
    }

    /// Log file for the run identified by `stamp`.
    #[must_use]
    pub fn log_path(&self, stamp: &RunStamp) -> PathBuf {
        self.log_dir.join(format!("nc-update-{stamp}.log"))
    }

    /// `owner:group` argument for `chown`.
    #[must_use]
    pub fn ownership(&self) -> String {
        format!("{}:{}", self.service_user, self.service_group)
    }

    /// The install's configuration subtree.
    #[must_use]
    pub fn config_subtree(&self) -> PathBuf {
        self.install_dir.join("config")
    }
}
