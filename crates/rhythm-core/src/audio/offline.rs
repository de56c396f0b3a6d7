//! Headless audio backend
//!
//! Drives the render callback from a plain thread at the buffer period and
//! discards the output. Used when no audio device is available so the game
//! (timeline, taps, state machine) still runs, and as a stand-in device in
//! integration setups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::backend::{AudioHost, AudioStream, AudioStreamCallback, DataCallbackResult};
use super::config::{AudioStreamBuilder, DEFAULT_BUFFER_FRAMES};
use super::error::{AudioError, AudioResult};
use crate::types::{AudioProperties, Sample, MAX_BUFFER_FRAMES};

/// Host whose streams render into a discarded buffer on a clocked thread
#[derive(Debug, Clone, Copy)]
pub struct OfflineHost {
    buffer_frames: u32,
}

impl OfflineHost {
    pub fn new() -> Self {
        Self {
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }

    /// Buffer size used when the builder doesn't request one
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = frames;
        self
    }
}

impl Default for OfflineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for OfflineHost {
    fn name(&self) -> &str {
        "offline"
    }

    fn open_stream(
        &self,
        builder: &AudioStreamBuilder,
        callback: Box<dyn AudioStreamCallback>,
    ) -> AudioResult<Box<dyn AudioStream>> {
        if builder.sample_rate == 0 || builder.channel_count == 0 {
            return Err(AudioError::ConfigError(format!(
                "offline stream needs a non-zero rate and channel count (got {}Hz, {} ch)",
                builder.sample_rate, builder.channel_count
            )));
        }

        let buffer_frames = builder
            .requested_buffer_frames()
            .unwrap_or(self.buffer_frames)
            .clamp(1, MAX_BUFFER_FRAMES as u32);

        let properties = AudioProperties::new(builder.channel_count, builder.sample_rate);
        log::info!(
            "Offline audio stream: {} channels, {}Hz, {} frames",
            properties.channel_count,
            properties.sample_rate,
            buffer_frames
        );

        Ok(Box::new(OfflineStream {
            properties,
            buffer_frames,
            callback: Some(callback),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }))
    }
}

/// Stream handle for `OfflineHost`
///
/// The callback lives in the handle while stopped and on the render thread
/// while running; stopping joins the thread and takes it back.
pub struct OfflineStream {
    properties: AudioProperties,
    buffer_frames: u32,
    callback: Option<Box<dyn AudioStreamCallback>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Box<dyn AudioStreamCallback>>>,
}

impl AudioStream for OfflineStream {
    fn properties(&self) -> AudioProperties {
        self.properties
    }

    fn buffer_size(&self) -> u32 {
        self.buffer_frames
    }

    fn request_start(&mut self) -> AudioResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut callback = self.callback.take().ok_or(AudioError::StreamClosed)?;

        let frames = self.buffer_frames as usize;
        let samples = self.properties.samples_for(frames);
        let period =
            Duration::from_secs_f64(frames as f64 / self.properties.sample_rate as f64);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);

        let worker = thread::Builder::new()
            .name("offline-audio".to_string())
            .spawn(move || {
                let mut buffer: Vec<Sample> = vec![0.0; samples];
                let mut next_deadline = Instant::now();
                while running.load(Ordering::Acquire) {
                    if callback.on_audio_ready(&mut buffer, frames) == DataCallbackResult::Stop {
                        break;
                    }
                    next_deadline += period;
                    let now = Instant::now();
                    if next_deadline > now {
                        thread::sleep(next_deadline - now);
                    }
                }
                callback
            })
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn request_stop(&mut self) -> AudioResult<()> {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let callback = worker.join().map_err(|_| {
                AudioError::StreamError("offline render thread panicked".to_string())
            })?;
            self.callback = Some(callback);
        }
        Ok(())
    }
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        if let Err(e) = self.request_stop() {
            log::error!("Offline stream shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingCallback {
        frames: Arc<AtomicUsize>,
        stop_after: Option<usize>,
    }

    impl AudioStreamCallback for CountingCallback {
        fn on_audio_ready(&mut self, audio_data: &mut [Sample], num_frames: usize) -> DataCallbackResult {
            audio_data.fill(0.0);
            let total = self.frames.fetch_add(num_frames, Ordering::Relaxed) + num_frames;
            match self.stop_after {
                Some(limit) if total >= limit => DataCallbackResult::Stop,
                _ => DataCallbackResult::Continue,
            }
        }
    }

    #[test]
    fn test_rejects_zero_rate() {
        let frames = Arc::new(AtomicUsize::new(0));
        let builder = AudioStreamBuilder::new().with_sample_rate(0);
        let result = OfflineHost::new().open_stream(
            &builder,
            Box::new(CountingCallback { frames, stop_after: None }),
        );
        assert!(matches!(result, Err(AudioError::ConfigError(_))));
    }

    #[test]
    fn test_callbacks_only_after_start() {
        let frames = Arc::new(AtomicUsize::new(0));
        let builder = AudioStreamBuilder::new().with_buffer_frames(64);
        let mut stream = OfflineHost::new()
            .open_stream(
                &builder,
                Box::new(CountingCallback { frames: Arc::clone(&frames), stop_after: None }),
            )
            .unwrap();

        assert_eq!(stream.buffer_size(), 64);
        assert_eq!(stream.channel_count(), 2);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(frames.load(Ordering::Relaxed), 0);

        stream.request_start().unwrap();
        thread::sleep(Duration::from_millis(30));
        stream.request_stop().unwrap();

        let rendered = frames.load(Ordering::Relaxed);
        assert!(rendered > 0);
        assert_eq!(rendered % 64, 0);

        // Stopped: no further callbacks
        thread::sleep(Duration::from_millis(10));
        assert_eq!(frames.load(Ordering::Relaxed), rendered);
    }

    #[test]
    fn test_callback_stop_ends_rendering() {
        let frames = Arc::new(AtomicUsize::new(0));
        let builder = AudioStreamBuilder::new().with_buffer_frames(64);
        let mut stream = OfflineHost::new()
            .open_stream(
                &builder,
                Box::new(CountingCallback { frames: Arc::clone(&frames), stop_after: Some(128) }),
            )
            .unwrap();

        stream.request_start().unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(frames.load(Ordering::Relaxed), 128);
        stream.request_stop().unwrap();
    }
}
