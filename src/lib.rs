//! nc-updater - interactive updater for self-hosted Nextcloud
//!
//! Automates the manual update procedure of a single Nextcloud installation: download a
//! release archive, back up the install, synchronize the new files while preserving
//! configuration and data, fix ownership, run `occ upgrade` and optionally the database
//! repair commands. Every phase is confirmed interactively and logged to a timestamped
//! file, and maintenance mode is switched off again on every way out of a run.
//!
//! # Architecture Overview
//!
//! One orchestrator ([`updater::Updater`]) drives thirteen phases strictly in order. It
//! talks to the outside world through three seams, each a trait with a production
//! implementation and a test double:
//!
//! - [`process::CommandRunner`] runs external commands (`cp`, `rsync`, `chown`, `occ`)
//! - [`cli::Prompter`] asks the operator
//! - [`updater::ArchiveFetcher`] downloads the release archive
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line flags, logging setup and interactive prompts
//! - [`config`] - TOML configuration with defaults for a stock install
//! - [`core`] - Typed errors, exit statuses and the run stamp
//! - [`occ`] - Nextcloud's administrative CLI
//! - [`process`] - Command description, execution and logging
//! - [`updater`] - The phases and the maintenance-mode finalizer
//! - [`utils`] - Run log, progress bars and host inspection
//!
//! # Example Configuration
//!
//! ```toml
//! default_version = "31.0.9"
//! install_dir = "/var/www/nextcloud"
//! data_dir = "/srv/nextcloud-data"
//! service_user = "www-data"
//! service_group = "www-data"
//! php_binary = "php8.3"
//! backup_root = "/var/backups/nextcloud"
//! ```
//!
//! # Usage
//!
//! ```bash
//! sudo nc-update
//! sudo nc-update --config ./nc-updater.toml --verbose
//! ```

// Core functionality modules
pub mod cli;
pub mod config;
pub mod core;
pub mod updater;

// External collaborators
pub mod occ;
pub mod process;

// Supporting modules
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
