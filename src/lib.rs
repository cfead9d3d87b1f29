//! Lifecycle management for a single local Android emulator instance.
//!
//! [`Emulator`] kills any stale process for its AVD, relaunches it, and waits
//! until the device reports a resumed foreground activity. It also passes adb
//! commands through to the running instance.
//!
//! Keep exactly one [`Emulator`] per AVD name.

mod adb;
mod config;
mod error;
mod instance;
mod paths;
mod process;
mod validation;

pub use adb::{AdbSession, LOOPBACK_HOST};
pub use config::{
    load_config, load_default_config, save_config, EmulatorConfig, RestartTimings,
    DEFAULT_PROCESS_PATTERN,
};
pub use error::{AppError, ErrorKind, Result, ResultExt};
pub use instance::{AdbOptions, Emulator};
pub use paths::config_path;
pub use process::{
    exec, find_pid, force_kill, is_process_alive, parse_pid, spawn_detached, wait_for_exit,
    CommandOutput, LaunchHandle, ProcessPattern, PROCESS_LISTING_COMMAND,
};
pub use validation::{validate_avd_name, validate_console_port};
