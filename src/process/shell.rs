//! Shell command execution with timeouts, and detached launches.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::oneshot;

use crate::error::{AppError, Result};

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[cfg(not(target_os = "windows"))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(target_os = "windows")]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Quote a value so the shell passes it through as a single word.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '='))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Run `command` through the shell, waiting at most `timeout`.
///
/// A non-zero exit is an [`ErrorKind::Command`](crate::ErrorKind::Command) error
/// carrying stderr; an elapsed timeout kills the shell and returns
/// [`ErrorKind::CommandTimeout`](crate::ErrorKind::CommandTimeout).
pub async fn exec(command: &str, timeout: Duration) -> Result<CommandOutput> {
    log::debug!("exec: {} (timeout {:?})", command, timeout);

    let child = shell_command(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AppError::command(command, format!("Failed to spawn shell: {e}")))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| AppError::command(command, e.to_string()))?,
        Err(_) => {
            log::debug!("exec: {} timed out after {:?}", command, timeout);
            return Err(AppError::command_timeout(command, timeout));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(AppError::command(
            command,
            format!(
                "{}: {}",
                output.status,
                if detail.is_empty() {
                    "(no output)"
                } else {
                    detail
                }
            ),
        ));
    }

    Ok(CommandOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// A process started by [`spawn_detached`].
#[derive(Debug)]
pub struct LaunchHandle {
    pid: u32,
    exit: Option<oneshot::Receiver<Result<()>>>,
}

impl LaunchHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Resolves once when the process exits: `Ok(())` for a clean exit,
    /// a launch error otherwise. Pending forever after that.
    pub async fn exited(&mut self) -> Result<()> {
        let Some(rx) = self.exit.as_mut() else {
            return std::future::pending().await;
        };
        let outcome = rx.await;
        self.exit = None;
        outcome.unwrap_or_else(|_| {
            log::warn!("Exit watcher for pid {} went away", self.pid);
            Ok(())
        })
    }
}

/// Start `program` without waiting for it.
///
/// Output is discarded, so the process does not depend on the calling runtime
/// once started. It runs in its own process group and is not killed when the
/// handle is dropped.
pub fn spawn_detached(program: &Path, args: &[String], label: &str) -> Result<LaunchHandle> {
    log::info!("Launching {} {}", program.display(), args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| {
        AppError::launch(format!("Failed to start {}: {}", program.display(), e))
    })?;

    let pid = child
        .id()
        .ok_or_else(|| AppError::launch("Failed to get process ID"))?;

    let (tx, rx) = oneshot::channel();
    let program_name = program.display().to_string();
    let label = label.to_string();
    tokio::spawn(async move {
        let outcome = match child.wait().await {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(AppError::launch(format!(
                "{} exited with {}",
                program_name, status
            ))),
            Err(e) => Err(AppError::launch(format!(
                "Failed to wait for {}: {}",
                program_name, e
            ))),
        };
        log::info!("Launched process for {} (pid: {}) exited", label, pid);
        let _ = tx.send(outcome);
    });

    Ok(LaunchHandle {
        pid,
        exit: Some(rx),
    })
}
