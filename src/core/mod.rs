//! Core types shared by every phase of an update run.
//!
//! - [`error`]: typed failures, exit statuses and operator-facing error rendering
//! - [`RunStamp`]: the per-run timestamp that names the log file and backup directory

pub mod error;

pub use error::{ErrorContext, UpdaterError, exit_code_for, user_friendly_error};

use chrono::{DateTime, Local};
use std::fmt;

/// Format used for the run stamp in file and directory names.
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Wall-clock identity of a single run.
///
/// Generated once at startup; both the log file and the backup directory embed it so
/// artifacts of one run can be matched up later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp {
    started_at: DateTime<Local>,
}

impl RunStamp {
    /// Capture the current local time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    /// Use a fixed time (tests and replays).
    #[must_use]
    pub const fn from_datetime(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
        }
    }

    /// When the run started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.started_at.format(RUN_STAMP_FORMAT))
    }
}
