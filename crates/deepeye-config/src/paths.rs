//! Platform-specific configuration locations.
//!
//! - Linux: `~/.config/deepeye/engine.toml`
//! - macOS: `~/Library/Application Support/deepeye/engine.toml`
//! - Windows: `%APPDATA%\deepeye\engine.toml`

use std::path::PathBuf;

use crate::error::{ConfigError, FileOp};

/// Application name used for directory paths.
const APP_NAME: &str = "deepeye";

/// File name of the engine configuration.
pub const CONFIG_FILE_NAME: &str = "engine.toml";

/// Returns the user-specific configuration directory.
///
/// Falls back to the current directory if the platform config directory
/// cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default path of the engine configuration file.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}

/// Create the user config directory if it doesn't exist.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::file(FileOp::CreateDir, &dir, e))?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_with_app_and_file() {
        let path = default_config_path();
        assert!(path.ends_with("deepeye/engine.toml"));
    }
}
