//! Single-source player
//!
//! A `Player` is owned by the mixer on the audio thread. Its playing and
//! looping flags live in `PlayerAtomics`, shared with any number of
//! `PlayerHandle`s so the UI thread can trigger it without a lock. A flag
//! written by the UI is picked up by the next render call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::source::AudioSource;
use crate::types::{fill_silence, Sample};

/// Lock-free flags shared between a player and its handles
///
/// Relaxed ordering: a stale read only delays the change by one callback.
#[derive(Debug, Default)]
pub struct PlayerAtomics {
    playing: AtomicBool,
    looping: AtomicBool,
}

impl PlayerAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }
}

/// UI-side control of a player that lives on the audio thread
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    atomics: Arc<PlayerAtomics>,
}

impl PlayerHandle {
    pub fn set_playing(&self, playing: bool) {
        self.atomics.set_playing(playing);
    }

    pub fn set_looping(&self, looping: bool) {
        self.atomics.set_looping(looping);
    }

    pub fn is_playing(&self) -> bool {
        self.atomics.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.atomics.is_looping()
    }
}

/// Plays one decoded source from a frame cursor
pub struct Player {
    source: Option<Shared<AudioSource>>,
    /// Next frame to render, always < source frame count
    cursor: usize,
    atomics: Arc<PlayerAtomics>,
}

// `basedrop::Shared` is not `Debug`, so this can't be derived
impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("source", &self.source.as_deref())
            .field("cursor", &self.cursor)
            .field("atomics", &self.atomics)
            .finish()
    }
}

impl Player {
    /// Create a stopped, non-looping player for a source
    pub fn new(source: Shared<AudioSource>) -> Self {
        Self {
            source: Some(source),
            cursor: 0,
            atomics: Arc::new(PlayerAtomics::new()),
        }
    }

    /// A player without a source; renders silence forever
    pub fn empty() -> Self {
        Self {
            source: None,
            cursor: 0,
            atomics: Arc::new(PlayerAtomics::new()),
        }
    }

    /// Handle for controlling this player from another thread
    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            atomics: Arc::clone(&self.atomics),
        }
    }

    pub fn set_playing(&self, playing: bool) {
        self.atomics.set_playing(playing);
    }

    pub fn set_looping(&self, looping: bool) {
        self.atomics.set_looping(looping);
    }

    pub fn is_playing(&self) -> bool {
        self.atomics.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.atomics.is_looping()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn source(&self) -> Option<&AudioSource> {
        self.source.as_deref()
    }

    /// Render `num_frames` interleaved frames into `output`
    ///
    /// The output channel count is `output.len() / num_frames`. When it
    /// differs from the source's, shared channels are copied and the rest
    /// are silent.
    ///
    /// Bounded time, no allocation, no locks. Safe to call from the audio
    /// callback.
    pub fn render_audio(&mut self, output: &mut [Sample], num_frames: usize) {
        if num_frames == 0 {
            return;
        }
        let out_channels = output.len() / num_frames;
        if out_channels == 0 {
            // Shorter than one sample per frame: nothing to write into
            fill_silence(output);
            return;
        }
        let output = &mut output[..num_frames * out_channels];

        let source = match self.source.as_deref() {
            Some(source) if source.frame_count() > 0 && self.atomics.is_playing() => source,
            _ => {
                fill_silence(output);
                return;
            }
        };

        let total_frames = source.frame_count();
        let src_channels = source.channel_count();
        let looping = self.atomics.is_looping();
        if self.cursor >= total_frames {
            self.cursor = 0;
        }

        let mut written = 0;
        while written < num_frames {
            let n = (total_frames - self.cursor).min(num_frames - written);
            copy_frames(
                &source.data()[self.cursor * src_channels..(self.cursor + n) * src_channels],
                src_channels,
                &mut output[written * out_channels..(written + n) * out_channels],
                out_channels,
            );
            written += n;
            self.cursor += n;

            if self.cursor >= total_frames {
                // Rewind either way; a one-shot replays from the start on its next trigger
                self.cursor = 0;
                if !looping {
                    self.atomics.set_playing(false);
                    break;
                }
            }
        }

        fill_silence(&mut output[written * out_channels..]);
    }
}

/// Copy interleaved frames between buffers of possibly different widths
#[inline]
fn copy_frames(src: &[Sample], src_channels: usize, dst: &mut [Sample], dst_channels: usize) {
    if src_channels == dst_channels {
        dst.copy_from_slice(src);
        return;
    }
    let shared = src_channels.min(dst_channels);
    for (src_frame, dst_frame) in src
        .chunks_exact(src_channels)
        .zip(dst.chunks_exact_mut(dst_channels))
    {
        dst_frame[..shared].copy_from_slice(&src_frame[..shared]);
        fill_silence(&mut dst_frame[shared..]);
    }
}
