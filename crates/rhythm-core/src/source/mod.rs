//! Decoded audio sources
//!
//! An `AudioSource` is a compressed asset decoded once, up front, into
//! interleaved `f32` PCM that already matches the stream's channel count and
//! sample rate. Players copy straight out of it on the audio thread.
//!
//! Decoding is blocking and slow (seconds for a full backing track), so it only
//! ever runs on the loader thread.

mod convert;
mod decode;

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::SampleRateConversionQuality;
use crate::types::{AudioProperties, Sample};

pub use convert::{remap_channels, resample};
pub use decode::{decode_file, AssetDecoder};

/// Errors raised while turning an asset into an `AudioSource`
#[derive(Error, Debug)]
pub enum SourceError {
    /// The asset could not be opened
    #[error("Failed to open asset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container or codec is not supported
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The asset decoded to nothing
    #[error("Asset {0} contains no audio frames")]
    Empty(String),

    /// Sample count doesn't divide into whole frames
    #[error("Invalid PCM layout: {0}")]
    InvalidLayout(String),

    /// Sample rate conversion failed or was not allowed
    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Immutable decoded PCM
#[derive(Debug, Clone)]
pub struct AudioSource {
    name: String,
    samples: Vec<Sample>,
    properties: AudioProperties,
}

impl AudioSource {
    /// Wrap interleaved samples
    ///
    /// Fails if the channel count is zero or the samples don't form whole frames.
    pub fn from_interleaved(
        name: impl Into<String>,
        samples: Vec<Sample>,
        properties: AudioProperties,
    ) -> SourceResult<Self> {
        let name = name.into();
        let channels = properties.channel_count as usize;
        if channels == 0 {
            return Err(SourceError::InvalidLayout(format!("{} has zero channels", name)));
        }
        if samples.len() % channels != 0 {
            return Err(SourceError::InvalidLayout(format!(
                "{}: {} samples is not a multiple of {} channels",
                name,
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            name,
            samples,
            properties,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> AudioProperties {
        self.properties
    }

    pub fn channel_count(&self) -> usize {
        self.properties.channel_count as usize
    }

    pub fn sample_rate(&self) -> u32 {
        self.properties.sample_rate
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count()
    }

    /// All samples, interleaved
    #[inline]
    pub fn data(&self) -> &[Sample] {
        &self.samples
    }

    pub fn duration_ms(&self) -> i64 {
        self.properties.frames_to_ms(self.frame_count() as u64)
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.samples.len() * std::mem::size_of::<Sample>()
    }
}

/// Turns asset names into sources matching the stream's format
///
/// Failure is a value: the caller must check it before building a player.
pub trait SourceDecoder: Send + Sync {
    fn decode(
        &self,
        asset: &str,
        target: AudioProperties,
        quality: SampleRateConversionQuality,
    ) -> SourceResult<AudioSource>;
}
