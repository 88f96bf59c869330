//! Supporting utilities: the run log, progress bars and host inspection.

pub mod platform;
pub mod progress;
pub mod run_log;

pub use platform::{command_exists, find_command, relative_inside};
pub use progress::ProgressBar;
pub use run_log::RunLog;
