//! Test utilities for nc-updater
//!
//! This module provides doubles and fixtures for driving a complete update run without
//! root privileges, a network connection or a real Nextcloud installation.
//!
//! - [`ScriptedPrompter`]: answers prompts from a queue
//! - [`RecordingRunner`]: records commands and simulates `occ` maintenance state
//! - [`FakeFetcher`]: "downloads" a freshly built release zip
//! - [`TestInstall`]: a scratch install, data, temp, backup and log layout
//!
//! # Example
//!
//! ```rust,no_run
//! use nc_updater::test_utils::{FakeFetcher, RecordingRunner, ScriptedPrompter, TestInstall};
//! use nc_updater::updater::Updater;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let install = TestInstall::new()?;
//! let updater = Updater::new(
//!     &install.config,
//!     RecordingRunner::new(),
//!     ScriptedPrompter::accepting_defaults(),
//!     FakeFetcher::release(),
//! )
//! .with_tool_lookup(|_| true)
//! .without_echo();
//!
//! updater.run().await?;
//! assert!(!updater.runner().maintenance_enabled());
//! # Ok(())
//! # }
//! ```

pub mod doubles;
pub mod environment;
pub mod fixtures;

pub use doubles::{FakeFetcher, RecordingRunner, ScriptedPrompter};
pub use environment::TestInstall;
pub use fixtures::{DEFAULT_RELEASE_FILES, write_release_zip};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` if set, or uses the provided level. Without either, tests run
/// without a subscriber.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
