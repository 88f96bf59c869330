//! Integration test suite for nc-updater
//!
//! End-to-end tests of the `nc-update` binary and of complete update runs driven
//! through the public library API with the test doubles from `test_utils`. None of them
//! need root, a network connection or a real Nextcloud.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: flag parsing, configuration errors and exit statuses of the binary
//! - **update_run**: full runs from a TOML configuration file to the run log

mod cli;
mod update_run;
