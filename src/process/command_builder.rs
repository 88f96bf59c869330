//! Type-safe builder describing an external command.
//!
//! A [`CommandSpec`] is plain data: program, arguments, extra environment, working
//! directory and an optional account to run as. Nothing is executed here; a
//! [`CommandRunner`](super::CommandRunner) turns the description into a process. Keeping
//! the description separate from execution lets every phase build its commands in a
//! testable way and lets the run log print exactly what is about to run.
//!
//! # Examples
//!
//! ```rust
//! use nc_updater::process::CommandSpec;
//!
//! let spec = CommandSpec::new("php")
//!     .arg("/var/www/nextcloud/occ")
//!     .args(["maintenance:mode", "--on"])
//!     .current_dir("/var/www/nextcloud")
//!     .run_as("www-data");
//!
//! assert_eq!(
//!     spec.display_line(),
//!     "sudo -u www-data php /var/www/nextcloud/occ maintenance:mode --on"
//! );
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// Program used to switch to the service account.
pub const SUDO: &str = "sudo";

/// Description of one external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (resolved through `PATH`)
    program: String,

    /// Arguments in order
    args: Vec<String>,

    /// Extra environment variables for the child
    env_vars: Vec<(String, String)>,

    /// Working directory (defaults to the updater's own)
    current_dir: Option<PathBuf>,

    /// Account to run as through `sudo -u`
    run_as: Option<String>,
}

impl CommandSpec {
    /// Start describing an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
            current_dir: None,
            run_as: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument.
    #[must_use]
    pub fn path_arg(self, path: impl AsRef<Path>) -> Self {
        self.arg(path.as_ref().display().to_string())
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Run as `user` through `sudo -u`.
    #[must_use]
    pub fn run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    /// Program as configured, before any `sudo` wrapping.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments as configured, before any `sudo` wrapping.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables.
    #[must_use]
    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env_vars
    }

    /// Working directory, if one was set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Account the command runs as, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.run_as.as_deref()
    }

    /// The program and arguments actually executed.
    ///
    /// With [`run_as`](Self::run_as) the command becomes `sudo -u <user> ...`. `sudo`
    /// resets the environment, so extra variables are passed through `env` in that case
    /// instead of being set on the `sudo` process.
    #[must_use]
    pub fn argv(&self) -> (String, Vec<String>) {
        let Some(user) = &self.run_as else {
            return (self.program.clone(), self.args.clone());
        };

        let mut args = vec!["-u".to_string(), user.clone()];
        if !self.env_vars.is_empty() {
            args.push("env".to_string());
            args.extend(self.env_vars.iter().map(|(key, value)| format!("{key}={value}")));
        }
        args.push(self.program.clone());
        args.extend(self.args.iter().cloned());
        (SUDO.to_string(), args)
    }

    /// Whether extra environment variables are set on the spawned process itself.
    #[must_use]
    pub fn sets_process_env(&self) -> bool {
        self.run_as.is_none()
    }

    /// Shell-like rendering for logs and error messages.
    #[must_use]
    pub fn display_line(&self) -> String {
        let (program, args) = self.argv();
        let mut parts = Vec::with_capacity(args.len() + 1);
        if self.sets_process_env() {
            parts.extend(self.env_vars.iter().map(|(key, value)| quote(&format!("{key}={value}"))));
        }
        parts.push(quote(&program));
        parts.extend(args.iter().map(|arg| quote(arg)));
        parts.join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

/// Single-quote a word if the shell would split or expand it.
fn quote(word: &str) -> String {
    let needs_quotes = word.is_empty()
        || word.chars().any(|c| c.is_whitespace() || "'\"$`\\*?!&;|<>()[]{}#~".contains(c));
    if needs_quotes {
        format!("'{}'", word.replace('\'', r"'\''"))
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_command() {
        let spec = CommandSpec::new("chown").args(["-R", "www-data:www-data", "/var/www/nextcloud"]);
        let (program, args) = spec.argv();
        assert_eq!(program, "chown");
        assert_eq!(args, ["-R", "www-data:www-data", "/var/www/nextcloud"]);
        assert_eq!(spec.display_line(), "chown -R www-data:www-data /var/www/nextcloud");
    }

    #[test]
    fn test_run_as_wraps_with_sudo() {
        let spec = CommandSpec::new("php").args(["occ", "status"]).run_as("www-data");
        let (program, args) = spec.argv();
        assert_eq!(program, "sudo");
        assert_eq!(args, ["-u", "www-data", "php", "occ", "status"]);
        assert_eq!(spec.user(), Some("www-data"));
    }

    #[test]
    fn test_run_as_passes_env_through_env() {
        let spec = CommandSpec::new("php")
            .args(["occ", "upgrade"])
            .env("OC_PASS", "x")
            .run_as("www-data");
        let (_, args) = spec.argv();
        assert_eq!(args, ["-u", "www-data", "env", "OC_PASS=x", "php", "occ", "upgrade"]);
        assert!(!spec.sets_process_env());
    }

    #[test]
    fn test_display_line_quotes_special_words() {
        let spec = CommandSpec::new("cp")
            .arg("-av")
            .path_arg("/srv/next cloud")
            .arg("it's")
            .env("LC_ALL", "C");
        assert_eq!(spec.display_line(), r"LC_ALL=C cp -av '/srv/next cloud' 'it'\''s'");
        assert_eq!(spec.to_string(), spec.display_line());
    }

    #[test]
    fn test_anchored_excludes_are_not_quoted() {
        let spec = CommandSpec::new("rsync").arg("--exclude=/config/");
        assert_eq!(spec.display_line(), "rsync --exclude=/config/");
    }
}
