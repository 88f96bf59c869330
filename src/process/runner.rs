//! Process execution with streamed, logged output.
//!
//! [`CommandRunner`] is the seam between the orchestrator and the operating system.
//! [`SystemRunner`] spawns real processes; tests substitute a recording double from
//! [`test_utils`](crate::test_utils). [`LoggedRunner`] decorates any runner with the
//! run log: it records every command line before it runs and turns failures into
//! [`UpdaterError::CommandFailed`].

use anyhow::{Context, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::CommandSpec;
use crate::core::UpdaterError;
use crate::utils::RunLog;

/// Exit status reported when the program could not be found, as a shell would.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Receives command output line by line as it is produced.
pub trait OutputSink {
    /// Called once per output line, without the trailing newline.
    fn line(&self, line: &str);
}

impl OutputSink for RunLog {
    fn line(&self, line: &str) {
        self.output(line);
    }
}

/// Sink that drops everything. Used before the run log exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardOutput;

impl OutputSink for DiscardOutput {
    fn line(&self, _line: &str) {}
}

/// Result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `128 + signal` when the process was killed by a signal
    pub status: i32,
    /// Combined stdout and stderr in arrival order
    pub output: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// Executes [`CommandSpec`]s.
///
/// Implementations stream each output line to `sink` while the command runs and return
/// the exit status with the combined output once it has finished. A non-zero exit status
/// is not an error at this level; only failing to run the command at all is.
pub trait CommandRunner {
    /// Run `spec` to completion.
    fn run(
        &self,
        spec: &CommandSpec,
        sink: &dyn OutputSink,
    ) -> impl std::future::Future<Output = Result<CommandOutput>>;
}

/// Runs commands as child processes of the updater.
///
/// Children are killed if the future driving them is dropped, which is what happens when
/// the operator interrupts the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, sink: &dyn OutputSink) -> Result<CommandOutput> {
        let start = Instant::now();
        let (program, args) = spec.argv();

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = spec.working_dir() {
            cmd.current_dir(dir);
        }
        if spec.sets_process_env() {
            for (key, value) in spec.env_vars() {
                tracing::trace!(target: "process", "Setting env var: {}={}", key, value);
                cmd.env(key, value);
            }
        }

        debug!(target: "process", "Executing command: {}", spec.display_line());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let message = format!("{program}: command not found");
                sink.line(&message);
                return Ok(CommandOutput {
                    status: EXIT_COMMAND_NOT_FOUND,
                    output: message,
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to execute {}", spec.display_line()));
            }
        };

        let stdout = child.stdout.take().context("child stdout was not captured")?;
        let stderr = child.stderr.take().context("child stderr was not captured")?;
        let output = stream_output(stdout, stderr, sink).await?;

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for {}", spec.display_line()))?;
        let status = exit_code(status);

        debug!(
            target: "process",
            "Command exited with status {} after {:.2}s",
            status,
            start.elapsed().as_secs_f64()
        );

        Ok(CommandOutput {
            status,
            output,
        })
    }
}

/// Read both pipes until they close, forwarding lines in arrival order.
async fn stream_output<O, E>(stdout: O, stderr: E, sink: &dyn OutputSink) -> Result<String>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut stdout = BufReader::new(stdout).split(b'\n');
    let mut stderr = BufReader::new(stderr).split(b'\n');
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut combined = String::new();

    while stdout_open || stderr_open {
        let segment = tokio::select! {
            segment = stdout.next_segment(), if stdout_open => {
                let segment = segment.context("Failed to read command stdout")?;
                stdout_open = segment.is_some();
                segment
            }
            segment = stderr.next_segment(), if stderr_open => {
                let segment = segment.context("Failed to read command stderr")?;
                stderr_open = segment.is_some();
                segment
            }
        };

        if let Some(bytes) = segment {
            let line = String::from_utf8_lossy(&bytes);
            let line = line.trim_end_matches('\r');
            sink.line(line);
            combined.push_str(line);
            combined.push('\n');
        }
    }

    Ok(combined)
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Decorates a [`CommandRunner`] with the run log.
///
/// Every command line is written to the log before execution and the command's output is
/// streamed into it. [`run_and_check`](Self::run_and_check) is the checked entry point used
/// by every phase that must stop the run on failure.
pub struct LoggedRunner<'a, R> {
    runner: &'a R,
    log: &'a RunLog,
}

impl<'a, R: CommandRunner> LoggedRunner<'a, R> {
    /// Wrap `runner`, logging to `log`.
    pub const fn new(runner: &'a R, log: &'a RunLog) -> Self {
        Self {
            runner,
            log,
        }
    }

    /// The run log commands are written to.
    pub const fn log(&self) -> &'a RunLog {
        self.log
    }

    /// Log and run `spec`, returning its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only when the command could not be executed at all.
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.log.command(&spec.display_line());
        self.runner.run(spec, self.log).await
    }

    /// Log and run `spec`, failing the run if it exits unsuccessfully.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::CommandFailed`] carrying the command's exit status when it
    /// exits non-zero, after logging which command failed and where the log is.
    pub async fn run_and_check(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec).await?;
        if output.success() {
            return Ok(output);
        }

        let command = spec.display_line();
        self.log.error(&format!(
            "Command failed with exit status {}: {}. See {} for details.",
            output.status,
            command,
            self.log.path().display()
        ));
        Err(UpdaterError::CommandFailed {
            command,
            status: output.status,
        }
        .into())
    }

    /// Log and run `spec`, logging a warning instead of failing on a non-zero exit.
    ///
    /// Returns whether the command succeeded.
    pub async fn run_tolerant(&self, spec: &CommandSpec) -> bool {
        match self.run(spec).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                self.log.warn(&format!(
                    "Ignoring exit status {} of: {}",
                    output.status,
                    spec.display_line()
                ));
                false
            }
            Err(e) => {
                self.log.warn(&format!("Ignoring failure of {}: {e:#}", spec.display_line()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CollectingSink {
        lines: Mutex<Vec<String>>,
    }

    impl OutputSink for CollectingSink {
        fn line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_system_runner_streams_both_pipes() {
        let sink = CollectingSink::default();
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);

        let output = SystemRunner.run(&spec, &sink).await.unwrap();

        assert_eq!(output.status, 3);
        assert!(!output.success());
        let lines = sink.lines.lock().unwrap().clone();
        assert!(lines.contains(&"out".to_string()));
        assert!(lines.contains(&"err".to_string()));
        assert!(output.output.contains("out\n"));
        assert!(output.output.contains("err\n"));
    }

    #[tokio::test]
    async fn test_system_runner_honors_working_dir_and_env() {
        let temp = TempDir::new().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "pwd; echo $NC_UPDATER_PROBE"])
            .env("NC_UPDATER_PROBE", "probe-value")
            .current_dir(temp.path());

        let output = SystemRunner.run(&spec, &DiscardOutput).await.unwrap();

        assert!(output.success());
        let canonical = temp.path().canonicalize().unwrap();
        assert!(output.output.contains(&canonical.display().to_string()));
        assert!(output.output.contains("probe-value"));
    }

    #[tokio::test]
    async fn test_missing_program_reports_127() {
        let spec = CommandSpec::new("nc-updater-no-such-program");
        let output = SystemRunner.run(&spec, &DiscardOutput).await.unwrap();
        assert_eq!(output.status, EXIT_COMMAND_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_and_check_logs_and_fails() {
        let temp = TempDir::new().unwrap();
        let log = RunLog::create(temp.path().join("run.log")).unwrap().without_echo();
        let runner = SystemRunner;
        let exec = LoggedRunner::new(&runner, &log);

        let spec = CommandSpec::new("sh").args(["-c", "echo upgrading; exit 5"]);
        let err = exec.run_and_check(&spec).await.unwrap_err();

        match err.downcast_ref::<UpdaterError>() {
            Some(UpdaterError::CommandFailed {
                status,
                command,
            }) => {
                assert_eq!(*status, 5);
                assert_eq!(command, "sh -c 'echo upgrading; exit 5'");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("$ sh -c 'echo upgrading; exit 5'"));
        assert!(content.contains("  upgrading"));
        assert!(content.contains("ERROR: Command failed with exit status 5"));
    }

    #[tokio::test]
    async fn test_run_tolerant_swallows_failure() {
        let temp = TempDir::new().unwrap();
        let log = RunLog::create(temp.path().join("run.log")).unwrap().without_echo();
        let runner = SystemRunner;
        let exec = LoggedRunner::new(&runner, &log);

        let ok = exec.run_tolerant(&CommandSpec::new("sh").args(["-c", "exit 1"])).await;

        assert!(!ok);
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("WARNING: Ignoring exit status 1"));
    }
}
