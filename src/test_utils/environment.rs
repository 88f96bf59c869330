//! Scratch Nextcloud layout for end-to-end runs

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::UpdaterConfig;
use crate::core::RunStamp;

/// Temporary install, data, temp, backup and log directories with a matching config.
///
/// Layout under the temporary root:
///
/// ```text
/// www/nextcloud/            install (index.php, occ, config/config.php)
/// www/nextcloud/data/       data
/// tmp/                      temp_dir
/// backups/                  backup_root
/// logs/                     log_dir (created by the run)
/// ```
pub struct TestInstall {
    pub temp_dir: TempDir,
    pub config: UpdaterConfig,
}

impl TestInstall {
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let install_dir = root.join("www").join("nextcloud");
        let data_dir = install_dir.join("data");

        fs::create_dir_all(install_dir.join("config"))?;
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(root.join("tmp"))?;
        fs::create_dir_all(root.join("backups"))?;
        fs::write(install_dir.join("index.php"), "<?php // 30.0.4\n")?;
        fs::write(install_dir.join("occ"), "#!/usr/bin/env php\n")?;
        fs::write(
            install_dir.join("config").join("config.php"),
            "<?php\n$CONFIG = ['instanceid' => 'test'];\n",
        )?;
        fs::write(data_dir.join(".ocdata"), "")?;

        let config = UpdaterConfig {
            install_dir,
            data_dir,
            temp_dir: root.join("tmp"),
            backup_root: root.join("backups"),
            log_dir: root.join("logs"),
            ..UpdaterConfig::default()
        };

        Ok(Self {
            temp_dir,
            config,
        })
    }

    /// Same layout with `customize` applied to the configuration.
    pub fn with_config(customize: impl FnOnce(&mut UpdaterConfig)) -> Result<Self> {
        let mut install = Self::new()?;
        customize(&mut install.config);
        Ok(install)
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Stamp used by tests that need predictable artifact names.
    pub fn fixed_stamp() -> RunStamp {
        RunStamp::from_datetime(
            Local
                .with_ymd_and_hms(2025, 1, 2, 3, 4, 5)
                .single()
                .unwrap_or_else(Local::now),
        )
    }

    /// Archive location for `version`.
    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.config.archive_path(version)
    }

    /// Contents of the run log for `stamp`.
    pub fn read_log(&self, stamp: &RunStamp) -> Result<String> {
        let path = self.config.log_path(stamp);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}
