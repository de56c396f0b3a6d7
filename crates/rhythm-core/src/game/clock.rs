//! Song clock and beat grid
//!
//! The render callback is the only place that knows when song audio was
//! produced, so it publishes an anchor: the monotonic time at which song
//! position 0 was rendered. A tap timestamp on the same clock becomes a song
//! position by subtracting the anchor and the output latency.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use crate::config::TimingConfig;

const NOT_STARTED: i64 = i64::MIN;

/// Milliseconds on the process-wide monotonic clock
///
/// Taps and the render callback must both use this clock.
pub fn monotonic_ms() -> i64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as i64
}

/// Maps monotonic time to song position
#[derive(Debug)]
pub struct SongClock {
    sample_rate: AtomicU32,
    output_latency_ms: AtomicI64,
    /// Written by the render callback only
    frames_rendered: AtomicU64,
    anchor_ms: AtomicI64,
}

impl SongClock {
    pub fn new() -> Self {
        Self {
            sample_rate: AtomicU32::new(0),
            output_latency_ms: AtomicI64::new(0),
            frames_rendered: AtomicU64::new(0),
            anchor_ms: AtomicI64::new(NOT_STARTED),
        }
    }

    /// Record the negotiated stream format, before the stream starts
    pub fn configure(&self, sample_rate: u32, output_latency_ms: f32) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.output_latency_ms
            .store(output_latency_ms.round() as i64, Ordering::Relaxed);
    }

    /// Called once per render callback with the time the block started
    ///
    /// Lock-free and allocation-free.
    #[inline]
    pub fn advance(&self, now_ms: i64, num_frames: usize) {
        let rate = self.sample_rate.load(Ordering::Relaxed) as u64;
        if rate == 0 {
            return;
        }
        let frames = self.frames_rendered.load(Ordering::Relaxed);
        let elapsed_ms = (frames * 1000 / rate) as i64;
        self.anchor_ms.store(now_ms - elapsed_ms, Ordering::Release);
        self.frames_rendered
            .store(frames + num_frames as u64, Ordering::Relaxed);
    }

    /// Monotonic time of song position 0, once rendering has begun
    pub fn anchor_ms(&self) -> Option<i64> {
        match self.anchor_ms.load(Ordering::Acquire) {
            NOT_STARTED => None,
            anchor => Some(anchor),
        }
    }

    pub fn output_latency_ms(&self) -> i64 {
        self.output_latency_ms.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Song position audible at monotonic time `timestamp_ms`
    pub fn song_position_ms(&self, timestamp_ms: i64) -> Option<i64> {
        self.anchor_ms()
            .map(|anchor| {
                timestamp_ms
                    .saturating_sub(anchor)
                    .saturating_sub(self.output_latency_ms())
            })
    }
}

impl Default for SongClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Evenly spaced expected beats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatGrid {
    pub interval_ms: i64,
    pub first_beat_ms: i64,
}

impl BeatGrid {
    pub fn new(interval_ms: i64, first_beat_ms: i64) -> Self {
        Self {
            interval_ms,
            first_beat_ms,
        }
    }

    /// Beat closest to `position_ms` (ties go to the later beat)
    ///
    /// Positions before the first beat snap to it. A non-positive interval
    /// means a single beat at `first_beat_ms`. The grid is evaluated in
    /// `i128`; a rounded-up beat past `i64::MAX` falls back to the one below.
    pub fn nearest_beat(&self, position_ms: i64) -> i64 {
        if self.interval_ms <= 0 || position_ms <= self.first_beat_ms {
            return self.first_beat_ms;
        }
        let first = self.first_beat_ms as i128;
        let interval = self.interval_ms as i128;
        let since_first = position_ms as i128 - first;

        let below = first + since_first / interval * interval;
        let beat = if 2 * (since_first % interval) >= interval {
            below + interval
        } else {
            below
        };
        i64::try_from(beat).unwrap_or(below as i64)
    }
}

impl From<&TimingConfig> for BeatGrid {
    fn from(timing: &TimingConfig) -> Self {
        Self::new(timing.beat_interval_ms, timing.first_beat_ms)
    }
}
