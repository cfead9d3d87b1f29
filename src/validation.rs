use crate::error::{AppError, Result};

/// First and last console ports the emulator accepts.
const MIN_CONSOLE_PORT: u16 = 5554;
const MAX_CONSOLE_PORT: u16 = 5682;

pub fn validate_avd_name(avd_name: &str) -> Result<()> {
    let is_safe = !avd_name.is_empty()
        && avd_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if !is_safe {
        return Err(AppError::config(format!("Invalid AVD name: {avd_name:?}")));
    }

    Ok(())
}

/// The emulator only binds even console ports in its reserved range.
pub fn validate_console_port(port: u16) -> Result<()> {
    if !(MIN_CONSOLE_PORT..=MAX_CONSOLE_PORT).contains(&port) || port % 2 != 0 {
        return Err(AppError::config(format!(
            "Console port {} must be even and within {}-{}",
            port, MIN_CONSOLE_PORT, MAX_CONSOLE_PORT
        )));
    }
    Ok(())
}
