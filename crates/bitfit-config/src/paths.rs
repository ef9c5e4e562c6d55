//! Per-user directories.

use std::path::PathBuf;

/// Application name for platform directory resolution.
const APP_NAME: &str = "bitfit";

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "BIT_FIT_CONFIG_DIR";

/// `~/.config/bitfit` (or the platform equivalent).
///
/// `BIT_FIT_CONFIG_DIR` takes precedence when set and non-empty.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for rolling log files.
pub fn log_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("logs"))
}
