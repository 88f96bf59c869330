//! Append-only run log shared by every phase.
//!
//! Each update run writes one plain-text file named after its [`RunStamp`](crate::core::RunStamp).
//! Everything the operator sees on the terminal also lands in the file: phase banners,
//! status lines, every external command line and the output those commands produce, in
//! the order it arrived. Terminal output is colored; the file is not.
//!
//! Write failures never abort a run. They are reported once through `tracing` and the
//! run carries on with terminal output only, since losing the log is preferable to
//! leaving Nextcloud in maintenance mode.

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Operator-facing log of one update run.
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
    echo: bool,
    write_failed: AtomicBool,
}

impl RunLog {
    /// Open (or create) the log file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be opened.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open run log: {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            echo: true,
            write_failed: AtomicBool::new(false),
        })
    }

    /// Stop mirroring log lines to the terminal. Used by tests.
    #[must_use]
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Phase banner, e.g. `==== [4/13] Download ====`.
    pub fn banner(&self, step: usize, total: usize, title: &str) {
        let line = format!("==== [{step}/{total}] {title} ====");
        if self.echo {
            println!();
            println!("{}", line.bold().blue());
        }
        self.write_stamped(&line);
    }

    /// Informational status line.
    pub fn info(&self, message: &str) {
        if self.echo {
            println!("{message}");
        }
        self.write_stamped(message);
    }

    /// Successful completion of a step.
    pub fn success(&self, message: &str) {
        if self.echo {
            println!("{}", message.green());
        }
        self.write_stamped(message);
    }

    /// Tolerated problem.
    pub fn warn(&self, message: &str) {
        if self.echo {
            eprintln!("{} {message}", "warning:".yellow().bold());
        }
        self.write_stamped(&format!("WARNING: {message}"));
    }

    /// Failure that ends the run.
    pub fn error(&self, message: &str) {
        if self.echo {
            eprintln!("{} {message}", "error:".red().bold());
        }
        self.write_stamped(&format!("ERROR: {message}"));
    }

    /// An external command about to run, logged verbatim.
    pub fn command(&self, command_line: &str) {
        if self.echo {
            println!("{}", format!("$ {command_line}").cyan());
        }
        self.write_stamped(&format!("$ {command_line}"));
    }

    /// One line of output from a running command.
    pub fn output(&self, line: &str) {
        if self.echo {
            println!("  {line}");
        }
        self.write_raw(&format!("  {line}"));
    }

    fn write_stamped(&self, message: &str) {
        let stamp = Local::now().format(LOG_TIME_FORMAT);
        self.write_raw(&format!("[{stamp}] {message}"));
    }

    fn write_raw(&self, line: &str) {
        let result = match self.file.lock() {
            Ok(mut file) => writeln!(file, "{line}"),
            Err(poisoned) => writeln!(poisoned.into_inner(), "{line}"),
        };

        if let Err(e) = result
            && !self.write_failed.swap(true, Ordering::Relaxed)
        {
            warn!("Failed to write to run log {}: {}", self.path.display(), e);
        }
    }
}
