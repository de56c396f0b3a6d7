//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or driving an audio stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Requested rate is outside the device range and conversion is disabled
    #[error("Sample rate {requested}Hz not supported (device range {min}-{max}Hz) and resampling is disabled")]
    UnsupportedSampleRate { requested: u32, min: u32, max: u32 },

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Failed to pause/stop stream
    #[error("Failed to stop audio stream: {0}")]
    StreamStopError(String),

    /// Stream error during playback
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// The stream's control thread is gone
    #[error("Audio stream is closed")]
    StreamClosed,

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
