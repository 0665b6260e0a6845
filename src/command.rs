//! Host shell command execution.
//!
//! Commands run through the platform shell with the caller's privileges. There
//! is no sandbox and no timeout: a command that never exits blocks its caller.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Captured output of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Spawn errors, non-zero exits and missing binaries all land here.
#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    ExecutionFailure(String),
}

/// Runs `command` and reports success or failure.
pub async fn try_run(command: &str) -> Result<CommandOutput, CommandError> {
    info!("[command] executing: {}", command);

    let output = shell(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CommandError::ExecutionFailure(format!("failed to spawn shell: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let mut message = format!("Command failed ({}): {}", output.status, command);
        if !stderr.trim().is_empty() {
            message.push('\n');
            message.push_str(stderr.trim_end());
        }
        return Err(CommandError::ExecutionFailure(message));
    }

    info!("[command] executed successfully");
    debug!("[command] stdout: {}", stdout);
    if !stderr.is_empty() {
        warn!("[command] stderr: {}", stderr);
    }

    Ok(CommandOutput { stdout, stderr })
}

/// Runs `command` and never fails: a failure comes back as empty stdout with
/// the error description in stderr.
pub async fn run(command: &str) -> CommandOutput {
    match try_run(command).await {
        Ok(output) => output,
        Err(e) => {
            error!("[command] error executing command: {}", e);
            CommandOutput {
                stdout: String::new(),
                stderr: e.to_string(),
            }
        }
    }
}

/// `cmd` re-parses its command line itself, so the command goes through
/// verbatim inside one pair of quotes (`/s` strips exactly that pair).
#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut c = Command::new("cmd");
    c.args(["/d", "/s", "/c"]).raw_arg(format!("\"{command}\""));
    c
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut c = Command::new("sh");
    c.args(["-c", command]);
    c
}
