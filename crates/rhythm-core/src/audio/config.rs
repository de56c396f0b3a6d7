//! Audio stream configuration
//!
//! `AudioStreamBuilder` collects everything the audio HAL needs to open a
//! stream: sample format, performance and sharing mode, sample rate, the
//! resample-quality fallback, channel count and optional device selection.

use serde::{Deserialize, Serialize};

use super::backend::{AudioHost, AudioStream, AudioStreamCallback};
use super::error::AudioResult;
use crate::types::{CHANNEL_COUNT, SAMPLE_RATE};

/// Buffer size requested in low-latency mode (frames)
/// 256 frames @ 48kHz = ~5.3ms
pub const LOW_LATENCY_BUFFER_FRAMES: u32 = 256;

/// Buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

/// Buffer size requested in power-saving mode (frames)
pub const POWER_SAVING_BUFFER_FRAMES: u32 = 2048;

/// Sample format of the device buffer handed to the render callback
///
/// The engine always renders `f32`; `I16` streams are converted on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    #[default]
    F32,
    I16,
}

/// Latency/power trade-off requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PerformanceMode {
    /// Let the host pick its default buffer size
    None,
    /// Large buffers, fewer wakeups
    PowerSaving,
    /// Smallest stable buffer the device accepts
    #[default]
    LowLatency,
}

/// Whether the stream asks for exclusive use of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SharingMode {
    #[default]
    Exclusive,
    Shared,
}

/// Quality of the sample rate conversion used when the device cannot run at
/// the requested rate
///
/// `None` disables the fallback: opening fails instead of converting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleRateConversionQuality {
    None,
    Fastest,
    Low,
    #[default]
    Medium,
    High,
    Best,
}

impl SampleRateConversionQuality {
    /// Whether a rate mismatch may be bridged by converting the sources
    pub fn allows_conversion(&self) -> bool {
        !matches!(self, SampleRateConversionQuality::None)
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "ALSA", "CoreAudio")
    /// If None, every available host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Builder describing the stream to open
///
/// Defaults to the game's fixed configuration: stereo `f32` at 48kHz,
/// low-latency, exclusive, with medium-quality conversion as fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioStreamBuilder {
    pub format: AudioFormat,
    pub performance_mode: PerformanceMode,
    pub sharing_mode: SharingMode,
    pub sample_rate: u32,
    pub conversion_quality: SampleRateConversionQuality,
    pub channel_count: u16,
    /// Explicit buffer size in frames; overrides the performance mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_frames: Option<u32>,
    /// Output device (None = system default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceId>,
}

impl Default for AudioStreamBuilder {
    fn default() -> Self {
        Self {
            format: AudioFormat::F32,
            performance_mode: PerformanceMode::LowLatency,
            sharing_mode: SharingMode::Exclusive,
            sample_rate: SAMPLE_RATE,
            conversion_quality: SampleRateConversionQuality::Medium,
            channel_count: CHANNEL_COUNT,
            buffer_frames: None,
            device: None,
        }
    }
}

impl AudioStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_performance_mode(mut self, mode: PerformanceMode) -> Self {
        self.performance_mode = mode;
        self
    }

    pub fn with_sharing_mode(mut self, mode: SharingMode) -> Self {
        self.sharing_mode = mode;
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_conversion_quality(mut self, quality: SampleRateConversionQuality) -> Self {
        self.conversion_quality = quality;
        self
    }

    pub fn with_channel_count(mut self, channels: u16) -> Self {
        self.channel_count = channels;
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = Some(frames);
        self
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Buffer size to request from the device, or None for the host default
    pub fn requested_buffer_frames(&self) -> Option<u32> {
        if let Some(frames) = self.buffer_frames {
            return Some(frames);
        }
        match self.performance_mode {
            PerformanceMode::None => None,
            PerformanceMode::PowerSaving => Some(POWER_SAVING_BUFFER_FRAMES),
            PerformanceMode::LowLatency => Some(LOW_LATENCY_BUFFER_FRAMES),
        }
    }

    /// Open a stream on `host` that calls back into `callback`
    pub fn open_stream(
        &self,
        host: &dyn AudioHost,
        callback: Box<dyn AudioStreamCallback>,
    ) -> AudioResult<Box<dyn AudioStream>> {
        log::debug!("Opening audio stream on {} host: {:?}", host.name(), self);
        host.open_stream(self, callback)
    }
}
