//! Platform-agnostic process control functions.

use std::time::{Duration, Instant};

use crate::error::{AppError, Result};

/// Interval between liveness checks while waiting for a process to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Check if a process is alive by PID.
#[cfg(not(target_os = "windows"))]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), None).is_ok()
}

/// Check if a process is alive by PID.
#[cfg(target_os = "windows")]
pub fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Send SIGKILL to a single process.
#[cfg(not(target_os = "windows"))]
pub fn force_kill(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| AppError::command("kill -9", format!("pid {pid} out of range")))?;
    kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|e| {
        AppError::command(
            &format!("kill -9 {pid}"),
            format!("Failed to send SIGKILL: {e}"),
        )
    })
}

#[cfg(target_os = "windows")]
pub fn force_kill(pid: u32) -> Result<()> {
    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output()
        .map_err(|e| AppError::command("taskkill", format!("Failed to run taskkill: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AppError::command(
            &format!("taskkill /PID {pid} /F"),
            stderr.trim().to_string(),
        ))
    }
}

/// Poll until `pid` is gone or `timeout` elapses. Returns whether it exited.
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !is_process_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}
