//! Common types for the rhythm engine
//!
//! Fundamental audio constants and the properties shared between the stream,
//! the decoded sources and the mixer.

/// Default sample rate requested from the audio device (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Default channel count requested from the audio device (stereo)
pub const CHANNEL_COUNT: u16 = 2;

/// Maximum number of frames rendered in one pass of the mixer scratch buffer
///
/// Covers all common device configurations (64 .. 4096). Larger callbacks are
/// rendered in several passes, so nothing is ever allocated on the audio thread.
pub const MAX_BUFFER_FRAMES: usize = 8192;

/// Channel count the mixer scratch buffer is sized for
///
/// Wider devices still work; they are rendered in more, shorter passes.
pub const MAX_CHANNELS: usize = 8;

/// Maximum number of tracks a mixer can hold
pub const MAX_TRACKS: usize = 100;

/// Audio sample type (32-bit float, interleaved)
pub type Sample = f32;

/// Channel layout and rate of a block of PCM
///
/// The opened stream reports its negotiated properties; sources are decoded
/// to exactly these so a player can copy frames straight into the stream buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProperties {
    pub channel_count: u16,
    pub sample_rate: u32,
}

impl AudioProperties {
    pub fn new(channel_count: u16, sample_rate: u32) -> Self {
        Self {
            channel_count,
            sample_rate,
        }
    }

    /// Number of interleaved samples needed to hold `frames` frames
    #[inline]
    pub fn samples_for(&self, frames: usize) -> usize {
        frames * self.channel_count as usize
    }

    /// Convert a frame count to whole milliseconds (truncating)
    #[inline]
    pub fn frames_to_ms(&self, frames: u64) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (frames * 1000 / self.sample_rate as u64) as i64
    }
}

impl Default for AudioProperties {
    fn default() -> Self {
        Self::new(CHANNEL_COUNT, SAMPLE_RATE)
    }
}

/// Write silence into an interleaved buffer
#[inline]
pub fn fill_silence(buffer: &mut [Sample]) {
    buffer.fill(0.0);
}
