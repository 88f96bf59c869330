//! Test doubles for the updater's three seams: prompts, commands and downloads

use anyhow::{Result, bail};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::fixtures::{DEFAULT_RELEASE_FILES, write_release_zip};
use crate::cli::prompt::Prompter;
use crate::process::{CommandOutput, CommandRunner, CommandSpec, OutputSink};
use crate::updater::ArchiveFetcher;

/// What happens once every scripted answer has been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhenExhausted {
    /// End of input, like Ctrl-D
    EndOfInput,
    /// Accept the default, like pressing Enter
    AcceptDefault,
    /// Never answer, like an operator who walked away
    Block,
}

/// Prompter answering from a queue.
///
/// `None` entries simulate end of input at that prompt.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
    when_exhausted: WhenExhausted,
}

impl ScriptedPrompter {
    /// Answer with `answers` in order, then end input.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_script(answers.into_iter().map(|answer| Some(answer.into())))
    }

    /// Answer with `script` in order, where `None` ends input at that prompt.
    pub fn from_script(script: impl IntoIterator<Item = Option<String>>) -> Self {
        Self {
            answers: Mutex::new(script.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            when_exhausted: WhenExhausted::EndOfInput,
        }
    }

    /// Press Enter at every prompt.
    pub fn accepting_defaults() -> Self {
        Self::new(Vec::<String>::new()).then_defaults()
    }

    /// After the scripted answers, press Enter at every prompt.
    #[must_use]
    pub fn then_defaults(mut self) -> Self {
        self.when_exhausted = WhenExhausted::AcceptDefault;
        self
    }

    /// After the scripted answers, never answer again.
    #[must_use]
    pub fn then_block(mut self) -> Self {
        self.when_exhausted = WhenExhausted::Block;
        self
    }

    /// Every prompt shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Prompter for ScriptedPrompter {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).push(prompt.to_string());
        let next = self.answers.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match (next, self.when_exhausted) {
            (Some(answer), _) => Ok(answer),
            (None, WhenExhausted::EndOfInput) => Ok(None),
            (None, WhenExhausted::AcceptDefault) => Ok(Some(String::new())),
            (None, WhenExhausted::Block) => std::future::pending().await,
        }
    }
}

/// Command runner that records every command instead of running it.
///
/// - `id -u` answers with the configured user id (root by default)
/// - `occ maintenance:mode --on/--off` flips a simulated maintenance flag
/// - `occ status` reports that flag
/// - commands matching a pattern registered with [`fail_when`](Self::fail_when) exit
///   with the given status
/// - everything else succeeds silently
pub struct RecordingRunner {
    commands: Mutex<Vec<CommandSpec>>,
    failures: Vec<(String, i32)>,
    maintenance: AtomicBool,
    euid: u32,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            failures: Vec::new(),
            maintenance: AtomicBool::new(false),
            euid: 0,
        }
    }

    /// Report `euid` from `id -u`.
    #[must_use]
    pub fn as_user(mut self, euid: u32) -> Self {
        self.euid = euid;
        self
    }

    /// Commands whose display line contains `pattern` exit with `status`.
    #[must_use]
    pub fn fail_when(mut self, pattern: &str, status: i32) -> Self {
        self.failures.push((pattern.to_string(), status));
        self
    }

    /// Every command run so far.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Display lines of every command run so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.commands().iter().map(CommandSpec::display_line).collect()
    }

    /// Number of commands whose display line contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.command_lines().iter().filter(|line| line.contains(pattern)).count()
    }

    /// Index of the first command whose display line contains `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.command_lines().iter().position(|line| line.contains(pattern))
    }

    /// Simulated maintenance mode state.
    pub fn maintenance_enabled(&self) -> bool {
        self.maintenance.load(Ordering::SeqCst)
    }

    fn respond(&self, spec: &CommandSpec) -> String {
        if spec.program() == "id" {
            return format!("{}\n", self.euid);
        }

        let args = spec.arguments();
        let is_occ = args.first().is_some_and(|script| script.ends_with("occ"));
        if !is_occ {
            return String::new();
        }

        match args.get(1..).unwrap_or_default() {
            [mode, flag] if mode == "maintenance:mode" && flag == "--on" => {
                self.maintenance.store(true, Ordering::SeqCst);
                "Maintenance mode enabled\n".to_string()
            }
            [mode, flag] if mode == "maintenance:mode" && flag == "--off" => {
                self.maintenance.store(false, Ordering::SeqCst);
                "Maintenance mode disabled\n".to_string()
            }
            [status] if status == "status" => format!(
                "  - installed: true\n  - version: 30.0.4.1\n  - maintenance: {}\n",
                self.maintenance_enabled()
            ),
            _ => String::new(),
        }
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec, sink: &dyn OutputSink) -> Result<CommandOutput> {
        self.commands.lock().unwrap_or_else(|e| e.into_inner()).push(spec.clone());

        let line = spec.display_line();
        if let Some((_, status)) = self.failures.iter().find(|(pattern, _)| line.contains(pattern)) {
            let output = "simulated failure\n".to_string();
            sink.line("simulated failure");
            return Ok(CommandOutput {
                status: *status,
                output,
            });
        }

        let output = self.respond(spec);
        for line in output.lines() {
            sink.line(line);
        }
        Ok(CommandOutput {
            status: 0,
            output,
        })
    }
}

/// Fetcher that writes a freshly built zip instead of downloading.
pub struct FakeFetcher {
    entries: Vec<(String, String)>,
    fail: bool,
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    /// Serves a minimal release with a `nextcloud/` root.
    pub fn release() -> Self {
        Self::with_entries(DEFAULT_RELEASE_FILES)
    }

    /// Serves an archive holding `entries`.
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
                .collect(),
            fail: false,
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch fails as if the server were unreachable.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::release()
        }
    }

    /// URLs requested so far.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ArchiveFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).push(url.to_string());
        if self.fail {
            bail!("error sending request for url ({url}): connection refused");
        }
        let entries =
            self.entries.iter().map(|(name, content)| (name.as_str(), content.as_str())).collect::<Vec<_>>();
        write_release_zip(dest, &entries)
    }
}
