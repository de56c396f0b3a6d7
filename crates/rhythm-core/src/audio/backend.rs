//! Audio backend traits for platform-specific implementations
//!
//! Defines the seam between the engine and the audio HAL:
//! - **AudioHost**: opens streams from an `AudioStreamBuilder`
//! - **AudioStream**: handle to an opened stream (start/stop, negotiated format)
//! - **AudioStreamCallback**: the render entry point the HAL calls periodically
//!
//! Implementations:
//! - **CpalHost**: real devices through CPAL
//! - **OfflineHost**: headless clocked thread, used when no device is available

use crate::types::{AudioProperties, Sample};

use super::config::AudioStreamBuilder;
use super::error::AudioResult;

/// Returned by the render callback to tell the driver whether to keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCallbackResult {
    Continue,
    Stop,
}

/// Render entry point invoked by the audio HAL on its real-time thread
///
/// Implementations must not block, allocate, lock or perform I/O: the call
/// has to return within one buffer period every time or the output drops out.
pub trait AudioStreamCallback: Send + 'static {
    /// Fill `audio_data` with `num_frames` interleaved frames
    fn on_audio_ready(&mut self, audio_data: &mut [Sample], num_frames: usize) -> DataCallbackResult;
}

/// Handle to an opened output stream
///
/// Dropping the handle stops and closes the stream. The callback is released
/// only after the driver has stopped calling it.
pub trait AudioStream: Send {
    /// Negotiated channel count and sample rate
    fn properties(&self) -> AudioProperties;

    /// Buffer size in frames (as negotiated with the device)
    fn buffer_size(&self) -> u32;

    /// Ask the driver to begin invoking the callback
    fn request_start(&mut self) -> AudioResult<()>;

    /// Ask the driver to stop invoking the callback
    fn request_stop(&mut self) -> AudioResult<()>;

    fn channel_count(&self) -> u16 {
        self.properties().channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.properties().sample_rate
    }

    /// Output latency in milliseconds (one buffer, output only)
    fn latency_ms(&self) -> f32 {
        let rate = self.sample_rate();
        if rate == 0 {
            return 0.0;
        }
        (self.buffer_size() as f32 / rate as f32) * 1000.0
    }
}

/// Something that can open output streams
pub trait AudioHost: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Open (but do not start) a stream calling back into `callback`
    fn open_stream(
        &self,
        builder: &AudioStreamBuilder,
        callback: Box<dyn AudioStreamCallback>,
    ) -> AudioResult<Box<dyn AudioStream>>;
}
