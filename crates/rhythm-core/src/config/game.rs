//! Game configuration
//!
//! Everything the session needs that isn't code: where the assets are, how
//! to negotiate the stream, and the beat timeline taps are judged against.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::default_assets_path;
use crate::audio::AudioStreamBuilder;

/// Top-level configuration file (`config.yaml`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub assets: AssetConfig,
    /// Stream request handed to the audio host
    pub stream: AudioStreamBuilder,
    pub timing: TimingConfig,
}

/// Asset locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory containing the compressed assets
    /// Default: platform data dir, e.g. `~/.local/share/rhythm-game/assets`
    pub directory: PathBuf,

    /// One-shot played on every tap
    /// Default: CLAP.mp3
    pub clap: String,

    /// Looping backing track
    /// Default: FUNKY_HOUSE.mp3
    pub backing_track: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            directory: default_assets_path(),
            clap: "CLAP.mp3".to_string(),
            backing_track: "FUNKY_HOUSE.mp3".to_string(),
        }
    }
}

/// Beat timeline and judging tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Half-width of the success window in milliseconds (inclusive)
    /// Default: 100
    pub tap_window_ms: i64,

    /// Milliseconds between expected beats
    /// Default: 500 (120 BPM)
    pub beat_interval_ms: i64,

    /// Song position of the first expected beat in milliseconds
    /// Default: 0
    pub first_beat_ms: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tap_window_ms: 100,
            beat_interval_ms: 500,
            first_beat_ms: 0,
        }
    }
}

impl TimingConfig {
    /// Reset values the judge can't use to their defaults
    ///
    /// The window must not be negative and beats must be at least 1ms apart.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let mut timing = self;
        if timing.tap_window_ms < 0 {
            log::warn!(
                "timing.tap_window_ms is negative ({}), using {}",
                timing.tap_window_ms,
                defaults.tap_window_ms
            );
            timing.tap_window_ms = defaults.tap_window_ms;
        }
        if timing.beat_interval_ms <= 0 {
            log::warn!(
                "timing.beat_interval_ms must be positive ({}), using {}",
                timing.beat_interval_ms,
                defaults.beat_interval_ms
            );
            timing.beat_interval_ms = defaults.beat_interval_ms;
        }
        timing
    }

    /// Tempo implied by the beat interval
    pub fn bpm(&self) -> f64 {
        if self.beat_interval_ms <= 0 {
            return 0.0;
        }
        60_000.0 / self.beat_interval_ms as f64
    }
}
