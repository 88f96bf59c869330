//! Error handling for nc-updater
//!
//! This module provides the typed failures of an update run and the user-facing rendering
//! of any error that reaches `main`. The design follows two rules:
//! 1. **Strongly-typed errors** for every failure that maps to a dedicated exit status
//! 2. **User-friendly messages** with details and an actionable suggestion on stderr
//!
//! # Architecture
//!
//! - [`UpdaterError`] - Enumerated failure cases, each with a stable process exit status
//! - [`ErrorContext`] - Wrapper that adds details and a suggestion for display
//! - [`user_friendly_error`] - Converts any [`anyhow::Error`] into an [`ErrorContext`]
//! - [`exit_code_for`] - Maps any [`anyhow::Error`] to the exit status `main` returns
//!
//! # Exit statuses
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 0 | Update completed |
//! | 65 | Archive did not contain the expected top-level directory |
//! | 66 | Install or data directory missing |
//! | 69 | Download failed or a required tool is not installed |
//! | 77 | Not running as root |
//! | 78 | Invalid configuration |
//! | 130 | Interrupted or aborted at a prompt |
//! | *n* | A wrapped external command failed with status *n* |
//! | 1 | Anything else |
//!
//! # Examples
//!
//! ```rust,no_run
//! use nc_updater::core::{UpdaterError, exit_code_for, user_friendly_error};
//!
//! let error = anyhow::Error::from(UpdaterError::NotPrivileged { euid: 1000 });
//! assert_eq!(exit_code_for(&error), 77);
//! user_friendly_error(error).display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status for failures that carry no dedicated code.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when the archive layout is not what the updater expects (`EX_DATAERR`).
pub const EXIT_EXTRACTED_TREE_MISSING: i32 = 65;
/// Exit status when the install or data directory is missing (`EX_NOINPUT`).
pub const EXIT_MISSING_DIRECTORY: i32 = 66;
/// Exit status when a download or a required tool is unavailable (`EX_UNAVAILABLE`).
pub const EXIT_UNAVAILABLE: i32 = 69;
/// Exit status when the process lacks root privileges (`EX_NOPERM`).
pub const EXIT_NOT_PRIVILEGED: i32 = 77;
/// Exit status for configuration errors (`EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
/// Exit status after Ctrl-C or end of input at a prompt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Failure cases of an update run.
///
/// Every variant maps to a process exit status through [`UpdaterError::exit_code`]. Errors
/// that are not represented here (I/O failures wrapped with context, for example) exit
/// with [`EXIT_FAILURE`].
#[derive(Error, Debug, Clone)]
pub enum UpdaterError {
    /// The effective user is not root.
    ///
    /// Ownership changes and running commands as the service account both need root, so
    /// the run refuses to start.
    #[error("nc-update must run as root (effective uid is {euid})")]
    NotPrivileged {
        /// Effective user id reported by `id -u`
        euid: u32,
    },

    /// A directory the run depends on does not exist.
    #[error("{role} directory does not exist: {}", path.display())]
    MissingDirectory {
        /// Which directory is missing ("install" or "data")
        role: &'static str,
        /// The configured path
        path: PathBuf,
    },

    /// A required external program is not on `PATH`.
    #[error("Required tool '{tool}' was not found in PATH")]
    MissingTool {
        /// Program name that was looked up
        tool: String,
    },

    /// Configuration file could not be used.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// The release archive could not be downloaded.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// URL that was requested
        url: String,
        /// Transport or HTTP failure description
        reason: String,
    },

    /// The archive extracted fine but the expected top-level directory is absent.
    #[error("Extracted release not found at {}", path.display())]
    ExtractedTreeMissing {
        /// Directory that should exist after extraction
        path: PathBuf,
    },

    /// A wrapped external command exited unsuccessfully.
    #[error("Command failed with exit status {status}: {command}")]
    CommandFailed {
        /// The command line as logged
        command: String,
        /// Exit status to propagate
        status: i32,
    },

    /// The operator pressed Ctrl-C or closed standard input.
    #[error("Update aborted by operator")]
    Interrupted,
}

impl UpdaterError {
    /// Process exit status for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotPrivileged { .. } => EXIT_NOT_PRIVILEGED,
            Self::MissingDirectory { .. } => EXIT_MISSING_DIRECTORY,
            Self::MissingTool { .. } | Self::DownloadFailed { .. } => EXIT_UNAVAILABLE,
            Self::ConfigError { .. } => EXIT_CONFIG,
            Self::ExtractedTreeMissing { .. } => EXIT_EXTRACTED_TREE_MISSING,
            Self::CommandFailed { status, .. } => *status,
            Self::Interrupted => EXIT_INTERRUPTED,
        }
    }
}

/// An error plus the details and suggestion shown to the operator.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error message
    pub error: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no details or suggestion.
    #[must_use]
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach additional details about the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Exit status for an error that reached the top of the run.
#[must_use]
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error.downcast_ref::<UpdaterError>().map_or(EXIT_FAILURE, UpdaterError::exit_code)
}

/// Convert any error into an [`ErrorContext`] with operator guidance.
///
/// Typed [`UpdaterError`]s get a tailored suggestion. Other errors keep their full
/// context chain as details so nothing is lost between `main` and the terminal.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(updater_error) = error.downcast_ref::<UpdaterError>() {
        return create_error_context(updater_error);
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(&error)
            .with_suggestion("Run nc-update with sudo and check ownership of the paths involved");
    }

    let chain = error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>();
    let context = ErrorContext::new(&error);
    if chain.is_empty() {
        context
    } else {
        context.with_details(chain.join(": "))
    }
}

fn create_error_context(error: &UpdaterError) -> ErrorContext {
    let context = ErrorContext::new(error);
    match error {
        UpdaterError::NotPrivileged { .. } => context
            .with_suggestion("Re-run the updater with 'sudo nc-update'")
            .with_details("Fixing ownership and running occ as the service account require root"),
        UpdaterError::MissingDirectory { .. } => context
            .with_suggestion("Check install_dir and data_dir in the updater configuration"),
        UpdaterError::MissingTool { tool } => context
            .with_suggestion(format!("Install '{tool}' with your package manager and retry")),
        UpdaterError::ConfigError { .. } => context.with_suggestion(
            "Fix the configuration file or pass a different one with --config",
        ),
        UpdaterError::DownloadFailed { .. } => context
            .with_suggestion("Check the version you entered and the host's network access")
            .with_details("Maintenance mode was not enabled yet; Nextcloud is untouched"),
        UpdaterError::ExtractedTreeMissing { .. } => context
            .with_suggestion("Remove the downloaded archive and run the updater again")
            .with_details("The archive did not contain a top-level 'nextcloud' directory"),
        UpdaterError::CommandFailed { .. } => context
            .with_suggestion("Inspect the run log, fix the cause, and restore from the backup if needed")
            .with_details("The updater attempted to leave maintenance mode before exiting"),
        UpdaterError::Interrupted => context,
    }
}
