//! Centralized path utilities for the library.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Get the root data directory (~/.avd_launcher).
pub fn get_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| AppError::config("Cannot find home directory"))?;
    Ok(home.join(".avd_launcher"))
}

/// Get the path to the default config file.
pub fn config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.toml"))
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }
    Ok(())
}
