use anyhow::{Context, Result};
use std::path::PathBuf;

/// Centralized path management for backgrounder

/// Get the backgrounder config directory, creating it if needed
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("backgrounder");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory at {}", config_dir.display()))?;

    Ok(config_dir)
}

/// Get the home directory of the invoking user, where stylesheet backups live
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Unable to determine home directory")
}
