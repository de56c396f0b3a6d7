//! Audio stream layer
//!
//! Everything between the engine and the audio HAL:
//!
//! - **AudioStreamBuilder**: format, performance/sharing mode, rate, channel
//!   count and the resample-quality fallback
//! - **AudioHost / AudioStream**: open, start, stop and close output streams
//! - **AudioStreamCallback**: the render entry point called on the HAL's
//!   real-time thread
//!
//! # Backends
//!
//! - **CpalHost**: real devices (ALSA/PipeWire, WASAPI, CoreAudio, AAudio)
//! - **OfflineHost**: clocked headless thread, for machines without a device
//!
//! # Example Usage
//!
//! ```ignore
//! use rhythm_core::audio::{AudioStreamBuilder, CpalHost};
//!
//! let mut stream = AudioStreamBuilder::new().open_stream(&CpalHost::new(), Box::new(renderer))?;
//! stream.request_start()?;
//! // ...
//! drop(stream); // stops callbacks, then releases the renderer
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod offline;

pub use backend::{AudioHost, AudioStream, AudioStreamCallback, DataCallbackResult};
pub use config::{
    AudioFormat, AudioStreamBuilder, DeviceId, PerformanceMode, SampleRateConversionQuality,
    SharingMode, DEFAULT_BUFFER_FRAMES, LOW_LATENCY_BUFFER_FRAMES, POWER_SAVING_BUFFER_FRAMES,
};
pub use cpal_backend::{CpalHost, CpalStream};
pub use device::{
    find_device_by_id, get_cpal_default_device, get_output_devices, negotiate_rate, pick_range,
    AudioDevice, OutputRange, StreamFit,
};
pub use error::{AudioError, AudioResult};
pub use offline::{OfflineHost, OfflineStream};
