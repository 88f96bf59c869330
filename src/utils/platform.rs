//! Host inspection helpers.

use std::path::{Path, PathBuf};

/// Checks whether a command is available on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Resolve a command to its absolute location on `PATH`.
#[must_use]
pub fn find_command(cmd: &str) -> Option<PathBuf> {
    which::which(cmd).ok()
}

/// `path` relative to `root`, if it lies strictly inside it.
///
/// Both paths are compared component-wise without touching the filesystem, so the
/// answer is only meaningful for normalized absolute paths like the ones in the
/// configuration.
#[must_use]
pub fn relative_inside(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative.to_path_buf())
    }
}
