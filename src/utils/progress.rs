//! Progress indicators for long-running transfers.
//!
//! Wraps `indicatif` with the updater's styling. Progress output is suppressed when the
//! `NC_UPDATER_NO_PROGRESS` environment variable is set or stderr is not a terminal, so
//! logs captured by `script` or `tee` stay readable.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Environment variable disabling all progress output.
pub const NO_PROGRESS_ENV_VAR: &str = "NC_UPDATER_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV_VAR).is_some() || !std::io::stderr().is_terminal()
}

/// A progress bar with consistent styling.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Byte-counting bar for a download of `total` bytes, or a spinner when the server
    /// did not announce a length.
    pub fn download(prefix: &str, total: Option<u64>) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else if let Some(total) = total {
            let bar = IndicatifBar::new(total);
            bar.set_style(download_style());
            bar
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_prefix(prefix.to_string());
        Self {
            inner: bar,
        }
    }

    /// Advance by `delta` bytes.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
        if self.inner.length().is_none() {
            self.inner.set_message(indicatif::HumanBytes(self.inner.position()).to_string());
        }
    }

    /// Remove the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
