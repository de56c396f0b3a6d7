//! Standard locations for the game's files

use std::path::PathBuf;

/// Application directory name under the platform config/data dirs
const APP_DIR: &str = "rhythm-game";

/// Get the default config directory
///
/// Returns: `~/.config/rhythm-game` (platform equivalent elsewhere)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Get the default config file path for a given file name
///
/// Returns: `~/.config/rhythm-game/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// Get the default asset directory
///
/// Returns: `~/.local/share/rhythm-game/assets` (platform equivalent elsewhere)
pub fn default_assets_path() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("assets")
}
