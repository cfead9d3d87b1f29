use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::process::{exec, shell_quote, CommandOutput};

/// Loopback address the emulator's adb transport is reached on.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// adb commands addressed to one device serial.
#[derive(Debug, Clone)]
pub struct AdbSession {
    adb_path: PathBuf,
    serial: String,
    host: String,
    forward_port: u16,
}

impl AdbSession {
    pub fn new(
        adb_path: impl Into<PathBuf>,
        serial: impl Into<String>,
        host: impl Into<String>,
        forward_port: u16,
    ) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial: serial.into(),
            host: host.into(),
            forward_port,
        }
    }

    pub fn adb_path(&self) -> &Path {
        &self.adb_path
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host-side endpoint of the forwarded device port, if forwarding is enabled.
    pub fn forward_endpoint(&self) -> Option<String> {
        (self.forward_port != 0).then(|| format!("http://{}:{}", self.host, self.forward_port))
    }

    /// Run `adb -s <serial> <command>`.
    ///
    /// `command` goes through the local shell, so `shell dumpsys ... | grep x`
    /// filters on the host.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let full = format!(
            "{} -s {} {}",
            shell_quote(&self.adb_path.to_string_lossy()),
            shell_quote(&self.serial),
            command
        );
        exec(&full, timeout).await
    }
}
