//! CPAL audio backend implementation
//!
//! Opens output streams on real devices through CPAL.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   Start/Stop/Close   ┌─────────────────────┐
//! │  Worker/UI Thread│───────────────────►  │ audio-stream thread │
//! │   (CpalStream)   │◄───────────────────  │ (owns cpal::Stream) │
//! └──────────────────┘     AudioResult      └──────────┬──────────┘
//!                                                      │ builds
//!                                                      ▼
//!                                           ┌─────────────────────┐
//!                                           │  CPAL Audio Thread  │
//!                                           │ (owns the callback) │
//!                                           └─────────────────────┘
//! ```
//!
//! `cpal::Stream` is not `Send` on every platform, so it never leaves the
//! thread that built it. The `CpalStream` handle only holds channels to that
//! thread and can be moved freely between the loader and the UI.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::Sample as _;
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig, SupportedBufferSize};

use super::backend::{AudioHost, AudioStream, AudioStreamCallback, DataCallbackResult};
use super::config::{AudioStreamBuilder, DEFAULT_BUFFER_FRAMES};
use super::device::{
    find_device_by_id, get_cpal_default_device, negotiate_rate, pick_range, OutputRange,
};
use super::error::{AudioError, AudioResult};
use crate::types::{fill_silence, AudioProperties, Sample, MAX_BUFFER_FRAMES};

/// Control messages for the thread owning the `cpal::Stream`
enum StreamControl {
    Start,
    Stop,
    Close,
}

/// What the stream thread reports back once the stream is built
struct StreamInfo {
    properties: AudioProperties,
    buffer_size: u32,
}

/// Host that opens streams on CPAL devices
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }
}

impl AudioHost for CpalHost {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_stream(
        &self,
        builder: &AudioStreamBuilder,
        callback: Box<dyn AudioStreamCallback>,
    ) -> AudioResult<Box<dyn AudioStream>> {
        let builder = builder.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<AudioResult<StreamInfo>>();
        let (control_tx, control_rx) = mpsc::channel::<StreamControl>();
        let (reply_tx, reply_rx) = mpsc::channel::<AudioResult<()>>();

        let thread = thread::Builder::new()
            .name("audio-stream".to_string())
            .spawn(move || stream_thread(builder, callback, ready_tx, control_rx, reply_tx))
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(info)) => Ok(Box::new(CpalStream {
                control: control_tx,
                replies: reply_rx,
                thread: Some(thread),
                properties: info.properties,
                buffer_size: info.buffer_size,
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::StreamBuildError(
                    "audio stream thread exited before the stream was built".to_string(),
                ))
            }
        }
    }
}

/// CPAL-specific stream handle
///
/// Keeps the stream thread alive. Drop this to stop audio.
pub struct CpalStream {
    control: mpsc::Sender<StreamControl>,
    replies: mpsc::Receiver<AudioResult<()>>,
    thread: Option<JoinHandle<()>>,
    properties: AudioProperties,
    buffer_size: u32,
}

impl CpalStream {
    fn request(&self, control: StreamControl) -> AudioResult<()> {
        self.control
            .send(control)
            .map_err(|_| AudioError::StreamClosed)?;
        self.replies.recv().map_err(|_| AudioError::StreamClosed)?
    }
}

impl AudioStream for CpalStream {
    fn properties(&self) -> AudioProperties {
        self.properties
    }

    fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    fn request_start(&mut self) -> AudioResult<()> {
        self.request(StreamControl::Start)
    }

    fn request_stop(&mut self) -> AudioResult<()> {
        self.request(StreamControl::Stop)
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let _ = self.control.send(StreamControl::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Audio stream thread panicked during shutdown");
            }
        }
    }
}

/// Body of the thread that owns the `cpal::Stream`
fn stream_thread(
    builder: AudioStreamBuilder,
    callback: Box<dyn AudioStreamCallback>,
    ready_tx: mpsc::Sender<AudioResult<StreamInfo>>,
    control_rx: mpsc::Receiver<StreamControl>,
    reply_tx: mpsc::Sender<AudioResult<()>>,
) {
    let (stream, info) = match build_stream(&builder, callback) {
        Ok(built) => built,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(info)).is_err() {
        return;
    }

    // A closed control channel means the handle is gone: fall through and close
    while let Ok(control) = control_rx.recv() {
        let reply = match control {
            StreamControl::Start => stream
                .play()
                .map_err(|e| AudioError::StreamPlayError(e.to_string())),
            StreamControl::Stop => stream
                .pause()
                .map_err(|e| AudioError::StreamStopError(e.to_string())),
            StreamControl::Close => break,
        };
        if reply_tx.send(reply).is_err() {
            break;
        }
    }

    // Dropping the stream joins CPAL's callback thread before the callback is freed
    drop(stream);
    log::info!("Audio stream closed");
}

/// Pick the device and configuration, then build the stream
fn build_stream(
    builder: &AudioStreamBuilder,
    callback: Box<dyn AudioStreamCallback>,
) -> AudioResult<(Stream, StreamInfo)> {
    let device = match &builder.device {
        Some(id) => find_device_by_id(id)?,
        None => get_cpal_default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);
    log::debug!(
        "Sharing mode {:?} is advisory on CPAL; the host decides device sharing",
        builder.sharing_mode
    );

    let (supported, buffer_size) = get_output_config(&device, builder)?;
    let sample_format = supported.sample_format();

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: match buffer_size {
            Some(frames) => CpalBufferSize::Fixed(frames),
            None => CpalBufferSize::Default,
        },
    };

    let properties = AudioProperties::new(stream_config.channels, stream_config.sample_rate.0);
    let buffer_size = buffer_size.unwrap_or(DEFAULT_BUFFER_FRAMES);

    log::info!(
        "Audio config: {} channels, {}Hz, {:?}, {} frames (~{:.1}ms latency)",
        properties.channel_count,
        properties.sample_rate,
        sample_format,
        buffer_size,
        buffer_size as f32 / properties.sample_rate as f32 * 1000.0
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_f32_stream(&device, &stream_config, callback)?,
        SampleFormat::I16 => build_i16_stream(&device, &stream_config, callback)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    Ok((stream, StreamInfo { properties, buffer_size }))
}

/// Get the best output configuration for a device
///
/// Returns (SupportedStreamConfig, buffer size in frames or None for the host default)
fn get_output_config(
    device: &cpal::Device,
    builder: &AudioStreamBuilder,
) -> AudioResult<(cpal::SupportedStreamConfig, Option<u32>)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let ranges: Vec<OutputRange> = supported_configs.iter().map(OutputRange::from).collect();
    let index = pick_range(&ranges, builder).ok_or_else(|| {
        AudioError::ConfigError("No output configuration in f32 or i16".to_string())
    })?;
    let best_config = &supported_configs[index];

    let sample_rate = negotiate_rate(&ranges[index], builder)?;
    if sample_rate != builder.sample_rate {
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (sources will be resampled, {:?} quality)",
            builder.sample_rate,
            sample_rate,
            builder.conversion_quality
        );
    }

    let buffer_size = builder.requested_buffer_frames().and_then(|frames| {
        match best_config.buffer_size() {
            SupportedBufferSize::Range { min, max } => Some(frames.clamp(*min, *max)),
            // The device can't tell us its range; a fixed request could be rejected
            SupportedBufferSize::Unknown => None,
        }
    });

    log::debug!(
        "Selected buffer size: {:?} frames for {:?} mode",
        buffer_size,
        builder.performance_mode
    );

    let stream_config = best_config
        .clone()
        .with_sample_rate(cpal::SampleRate(sample_rate));

    Ok((stream_config, buffer_size))
}

/// Build an output stream whose device buffer is `f32`
fn build_f32_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut callback: Box<dyn AudioStreamCallback>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut stopped = false;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                // CPAL can't be stopped from inside its callback; hold silence instead
                if stopped {
                    fill_silence(data);
                    return;
                }
                let num_frames = data.len() / channels;
                if callback.on_audio_ready(data, num_frames) == DataCallbackResult::Stop {
                    stopped = true;
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

/// Build an output stream whose device buffer is `i16`
///
/// The callback renders into a pre-allocated `f32` scratch buffer which is
/// converted chunk by chunk, so nothing is allocated per callback.
fn build_i16_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut callback: Box<dyn AudioStreamCallback>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut scratch: Vec<Sample> = vec![0.0; MAX_BUFFER_FRAMES * channels];
    let mut stopped = false;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(scratch.len()) {
                    let rendered = &mut scratch[..chunk.len()];
                    if stopped {
                        fill_silence(rendered);
                    } else if callback.on_audio_ready(rendered, chunk.len() / channels)
                        == DataCallbackResult::Stop
                    {
                        stopped = true;
                    }
                    for (dst, src) in chunk.iter_mut().zip(rendered.iter()) {
                        *dst = src.to_sample::<i16>();
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
