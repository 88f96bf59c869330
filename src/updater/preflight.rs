//! Preconditions checked before anything on the host is touched.

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::config::UpdaterConfig;
use crate::core::UpdaterError;
use crate::process::{CommandRunner, CommandSpec, DiscardOutput, SUDO};
use crate::utils::find_command;

/// External programs every run needs, besides the configured PHP binary.
pub const REQUIRED_TOOLS: &[&str] = &["rsync", "cp", "chown", SUDO];

/// Fail with [`UpdaterError::NotPrivileged`] unless the effective user is root.
pub async fn ensure_root<R: CommandRunner>(runner: &R) -> Result<()> {
    let output = runner
        .run(&CommandSpec::new("id").arg("-u"), &DiscardOutput)
        .await
        .context("Failed to determine the effective user id")?;
    if !output.success() {
        anyhow::bail!("`id -u` exited with status {}", output.status);
    }

    let euid = output
        .output
        .trim()
        .parse::<u32>()
        .with_context(|| format!("Unexpected output from `id -u`: {:?}", output.output.trim()))?;
    debug!("Effective user id: {}", euid);

    if euid == 0 {
        Ok(())
    } else {
        Err(UpdaterError::NotPrivileged {
            euid,
        }
        .into())
    }
}

/// Fail with [`UpdaterError::MissingDirectory`] unless install and data directories exist.
pub async fn ensure_directories(config: &UpdaterConfig) -> Result<()> {
    for (role, path) in [("install", &config.install_dir), ("data", &config.data_dir)] {
        let is_dir = fs::metadata(path).await.map(|meta| meta.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(UpdaterError::MissingDirectory {
                role,
                path: path.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Fail with [`UpdaterError::MissingTool`] for the first required program `lookup` cannot find.
pub fn ensure_tools(config: &UpdaterConfig, lookup: fn(&str) -> bool) -> Result<()> {
    let tools = REQUIRED_TOOLS.iter().copied().chain(std::iter::once(config.php_binary.as_str()));
    for tool in tools {
        if !lookup(tool) {
            return Err(UpdaterError::MissingTool {
                tool: tool.to_string(),
            }
            .into());
        }
        match find_command(tool) {
            Some(path) => debug!("Found required tool {} at {}", tool, path.display()),
            None => debug!("Found required tool {}", tool),
        }
    }
    Ok(())
}
