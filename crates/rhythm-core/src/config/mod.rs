//! Configuration for the rhythm game
//!
//! - `config.yaml` loading (per-section fallback) and saving
//! - Standard config and asset paths
//! - `GameConfig`: assets, stream request and beat timing
//!
//! # Usage
//!
//! ```ignore
//! use rhythm_core::config::{default_config_path, load_config, save_config, GameConfig};
//!
//! let path = default_config_path("config.yaml");
//! let config = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod game;
mod io;
mod paths;

pub use game::{AssetConfig, GameConfig, TimingConfig};
pub use io::{load_config, parse_config, save_config};
pub use paths::{default_assets_path, default_config_dir, default_config_path};

/// File name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";
