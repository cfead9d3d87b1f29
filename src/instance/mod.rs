//! One managed emulator instance.
//!
//! An [`Emulator`] is bound to a single AVD name. Only one handle should exist
//! per AVD name: two handles for the same name race on the same OS process.
//! Restarts take `&mut self`, so a single handle can never run two at once.

mod health;
mod lifecycle;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adb::{AdbSession, LOOPBACK_HOST};
use crate::config::{EmulatorConfig, RestartTimings, DEFAULT_PROCESS_PATTERN};
use crate::error::Result;
use crate::process::{find_pid, CommandOutput, ProcessPattern};

/// How to reach the running instance over adb.
#[derive(Debug, Clone)]
pub struct AdbOptions {
    pub adb_path: PathBuf,
    /// Host port forwarded to the device (0 disables forwarding).
    pub forward_port: u16,
}

/// `emulator -avd <avd_name> -port <port> <extra_args>`.
#[derive(Debug)]
pub struct Emulator {
    emulator_path: PathBuf,
    avd_name: String,
    port: u16,
    extra_args: String,
    process_pattern: String,
    timings: RestartTimings,
    adb: AdbSession,
}

impl Emulator {
    /// Bind a handle to `avd_name`. No I/O and no validation happen here.
    pub fn new(
        emulator_path: impl Into<PathBuf>,
        avd_name: impl Into<String>,
        port: u16,
        extra_args: impl Into<String>,
        adb: AdbOptions,
    ) -> Self {
        let adb = AdbSession::new(
            adb.adb_path,
            serial_for_port(port),
            LOOPBACK_HOST,
            adb.forward_port,
        );
        Self {
            emulator_path: emulator_path.into(),
            avd_name: avd_name.into(),
            port,
            extra_args: extra_args.into(),
            process_pattern: DEFAULT_PROCESS_PATTERN.to_string(),
            timings: RestartTimings::default(),
            adb,
        }
    }

    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::new(
            &config.emulator_path,
            &config.avd_name,
            config.port,
            &config.extra_args,
            AdbOptions {
                adb_path: config.adb_path.clone(),
                forward_port: config.forward_port,
            },
        )
        .with_process_pattern(&config.process_pattern)
        .with_timings(config.timings)
    }

    pub fn with_timings(mut self, timings: RestartTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Override the `ps -ef` pattern; `{name}` stands for the AVD name.
    pub fn with_process_pattern(mut self, template: &str) -> Self {
        self.process_pattern = template.to_string();
        self
    }

    pub fn emulator_path(&self) -> &Path {
        &self.emulator_path
    }

    pub fn avd_name(&self) -> &str {
        &self.avd_name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn extra_args(&self) -> &str {
        &self.extra_args
    }

    pub fn timings(&self) -> RestartTimings {
        self.timings
    }

    pub fn adb(&self) -> &AdbSession {
        &self.adb
    }

    /// adb serial of the running instance, `emulator-<port>`.
    pub fn serial(&self) -> &str {
        self.adb.serial()
    }

    /// Run an adb command against the instance.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        self.adb.exec(command, timeout).await
    }

    pub fn process_pattern(&self) -> Result<ProcessPattern> {
        ProcessPattern::for_instance(&self.process_pattern, &self.avd_name)
    }

    /// Pid of the emulator process for this AVD.
    pub async fn find_pid(&self) -> Result<u32> {
        find_pid(&self.process_pattern()?, self.timings.command_timeout()).await
    }

    pub async fn is_running(&self) -> bool {
        self.find_pid().await.is_ok()
    }
}

fn serial_for_port(port: u16) -> String {
    format!("emulator-{port}")
}
