//! Configuration management for nc-updater.
//!
//! A single optional TOML file describes where the Nextcloud installation lives, which
//! account owns it, and where downloads, backups and logs go. See [`UpdaterConfig`] for
//! the keys, their defaults and the lookup order.

mod updater;

pub use updater::{
    CONFIG_ENV_VAR, EXTRACTED_DIR_NAME, SYSTEM_CONFIG_PATH, UpdaterConfig, VERSION_PLACEHOLDER,
};
