use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::paths::{config_path, ensure_parent_dir};
use crate::validation::{validate_avd_name, validate_console_port};

/// Process pattern matched against `ps -ef`; `{name}` is replaced by the AVD name.
pub const DEFAULT_PROCESS_PATTERN: &str = "/emulator/qemu/.*{name}";

/// Everything needed to manage one emulator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    pub emulator_path: PathBuf,
    pub avd_name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Appended to `-avd <name> -port <port>`, split on whitespace.
    #[serde(default)]
    pub extra_args: String,
    pub adb_path: PathBuf,
    /// Host port forwarded to the device (0 disables forwarding).
    #[serde(default)]
    pub forward_port: u16,
    #[serde(default = "default_process_pattern")]
    pub process_pattern: String,
    #[serde(default)]
    pub timings: RestartTimings,
}

fn default_port() -> u16 {
    5554
}

fn default_process_pattern() -> String {
    DEFAULT_PROCESS_PATTERN.to_string()
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<()> {
        validate_avd_name(&self.avd_name)?;
        validate_console_port(self.port)?;
        if self.emulator_path.as_os_str().is_empty() {
            return Err(AppError::config("emulator_path is empty"));
        }
        if self.adb_path.as_os_str().is_empty() {
            return Err(AppError::config("adb_path is empty"));
        }
        if !self.process_pattern.contains("{name}") {
            return Err(AppError::config(format!(
                "process_pattern {:?} does not contain {{name}}",
                self.process_pattern
            )));
        }
        Ok(())
    }
}

/// Fixed delays used by the restart protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartTimings {
    /// Delay between the start of a racing iteration and its readiness probe.
    #[serde(default = "default_probe_delay_ms")]
    pub probe_delay_ms: u64,
    /// Sleep after the first positive probe before reporting success.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Timeout for `ps`, `kill` and probe commands.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_probe_delay_ms() -> u64 {
    3000
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_command_timeout_ms() -> u64 {
    1000
}

impl Default for RestartTimings {
    fn default() -> Self {
        Self {
            probe_delay_ms: default_probe_delay_ms(),
            settle_ms: default_settle_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl RestartTimings {
    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.probe_delay_ms)
    }

    pub fn settle_period(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

pub fn load_config(path: &Path) -> Result<EmulatorConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: EmulatorConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &EmulatorConfig) -> Result<()> {
    config.validate()?;
    ensure_parent_dir(path)?;
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).map_err(|e| AppError::config(e.to_string()))
}

/// Load the config stored at `~/.avd_launcher/config.toml`.
pub fn load_default_config() -> Result<EmulatorConfig> {
    load_config(&config_path()?)
}
