//! Reading and writing `config.yaml`
//!
//! A missing or broken config never stops the game from starting. Each
//! section (`assets`, `stream`, `timing`) is read on its own, so a mistake in
//! one falls back to that section's defaults and keeps the others.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use super::game::{GameConfig, TimingConfig};

const SECTIONS: [&str; 3] = ["assets", "stream", "timing"];

/// Load the game config, falling back to defaults where it can't be used
///
/// ```ignore
/// let config = load_config(&default_config_path(CONFIG_FILE_NAME));
/// ```
pub fn load_config(path: &Path) -> GameConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No config at {:?}, using defaults", path);
            return GameConfig::default();
        }
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            return GameConfig::default();
        }
    };

    let config = parse_config(&contents);
    log::info!(
        "Loaded config from {:?} ({:.0} BPM, ±{}ms window)",
        path,
        config.timing.bpm(),
        config.timing.tap_window_ms
    );
    config
}

/// Parse config YAML section by section
///
/// Unknown sections are ignored, broken sections are replaced by their
/// defaults and out-of-range timing values are reset.
pub fn parse_config(yaml: &str) -> GameConfig {
    let root = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(root)) => root,
        // Empty file
        Ok(Value::Null) => return GameConfig::default(),
        Ok(_) => {
            log::warn!("Config must be a mapping of sections, using defaults");
            return GameConfig::default();
        }
        Err(e) => {
            log::warn!("Invalid config YAML: {}, using defaults", e);
            return GameConfig::default();
        }
    };

    for key in root.keys() {
        match key.as_str() {
            Some(name) if SECTIONS.contains(&name) => {}
            _ => log::warn!("Ignoring unknown config section {:?}", key),
        }
    }

    let timing = section(&root, "timing");
    GameConfig {
        assets: section(&root, "assets"),
        stream: section(&root, "stream"),
        timing: TimingConfig::validated(timing),
    }
}

fn section<T>(root: &Mapping, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let value = match root.get(key) {
        None | Some(Value::Null) => return T::default(),
        Some(value) => value.clone(),
    };
    match serde_yaml::from_value(value) {
        Ok(section) => section,
        Err(e) => {
            log::warn!("Invalid `{}` config section: {}, using its defaults", key, e);
            T::default()
        }
    }
}

/// Write the game config as YAML, creating parent directories as needed
///
/// The file is written next to its destination and renamed into place, so an
/// interrupted save leaves the previous config intact.
pub fn save_config(config: &GameConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize game config")?;

    let staging = path.with_extension("yaml.tmp");
    std::fs::write(&staging, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", staging))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to move config into place: {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}
