//! Interactive prompts.
//!
//! All operator input goes through the [`Prompter`] trait so the orchestrator can be
//! driven by scripted answers in tests. `None` from [`Prompter::read_line`] means the
//! operator ended input (Ctrl-D) and is treated exactly like an interrupt.

use anyhow::Result;
use colored::Colorize;
use std::io::{self, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::core::UpdaterError;

/// Source of operator answers.
pub trait Prompter {
    /// Show `prompt` and read one line without its trailing newline.
    ///
    /// Returns `Ok(None)` at end of input.
    fn read_line(&self, prompt: &str) -> impl std::future::Future<Output = Result<Option<String>>>;
}

/// Reads answers from the controlling terminal.
///
/// One line reader lives as long as the prompter, so answers typed ahead or piped in
/// are buffered until the next prompt instead of being discarded.
#[derive(Debug)]
pub struct TerminalPrompter<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl TerminalPrompter {
    #[must_use]
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead + Unpin> TerminalPrompter<R> {
    /// Prompt on stdout, reading answers from `reader`.
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }
}

impl<R: AsyncBufRead + Unpin> Prompter for TerminalPrompter<R> {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        print!("{} ", prompt.green());
        io::stdout().flush()?;

        // Async I/O so Ctrl-C can be observed while waiting
        let line = self.lines.lock().await.next_line().await?;
        if line.is_none() {
            println!();
        }
        Ok(line.map(|answer| answer.trim_end_matches('\r').to_string()))
    }
}

/// Ask for a value, falling back to `default` on empty input.
///
/// # Errors
///
/// Returns [`UpdaterError::Interrupted`] at end of input.
pub async fn ask_with_default<P: Prompter + ?Sized>(
    prompter: &P,
    question: &str,
    default: &str,
) -> Result<String> {
    let answer = prompter
        .read_line(&format!("{question} [{default}]:"))
        .await?
        .ok_or(UpdaterError::Interrupted)?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

/// Yes/no question. Empty input picks `default_yes`; unrecognized answers ask again.
///
/// # Errors
///
/// Returns [`UpdaterError::Interrupted`] at end of input.
pub async fn confirm<P: Prompter + ?Sized>(
    prompter: &P,
    question: &str,
    default_yes: bool,
) -> Result<bool> {
    let hint = if default_yes {
        "[Y/n]"
    } else {
        "[y/N]"
    };
    loop {
        let answer = prompter
            .read_line(&format!("{question} {hint}:"))
            .await?
            .ok_or(UpdaterError::Interrupted)?;
        match parse_yes_no(&answer) {
            Some(choice) => return Ok(choice.unwrap_or(default_yes)),
            None => println!("{}", "Please answer 'y' or 'n'.".yellow()),
        }
    }
}

/// Block until the operator presses Enter.
///
/// # Errors
///
/// Returns [`UpdaterError::Interrupted`] at end of input.
pub async fn acknowledge<P: Prompter + ?Sized>(prompter: &P, message: &str) -> Result<()> {
    prompter
        .read_line(&format!("{message} Press Enter to continue, Ctrl-C to abort."))
        .await?
        .ok_or(UpdaterError::Interrupted)?;
    Ok(())
}

/// `Some(None)` for empty input, `Some(Some(choice))` for a recognized answer, `None`
/// otherwise.
fn parse_yes_no(answer: &str) -> Option<Option<bool>> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(None),
        "y" | "yes" => Some(Some(true)),
        "n" | "no" => Some(Some(false)),
        _ => None,
    }
}
