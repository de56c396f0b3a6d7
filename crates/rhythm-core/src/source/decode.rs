//! Asset decoding (symphonia)
//!
//! Assets are looked up by name under a root directory, decoded fully to
//! interleaved `f32`, then remapped and resampled to the stream's format.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::convert::{remap_channels, resample};
use super::{AudioSource, SourceDecoder, SourceError, SourceResult};
use crate::audio::SampleRateConversionQuality;
use crate::types::{AudioProperties, Sample};

/// Decodes named assets from a directory
#[derive(Debug, Clone)]
pub struct AssetDecoder {
    root: PathBuf,
}

impl AssetDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a named asset
    pub fn asset_path(&self, asset: &str) -> PathBuf {
        self.root.join(asset)
    }
}

impl SourceDecoder for AssetDecoder {
    fn decode(
        &self,
        asset: &str,
        target: AudioProperties,
        quality: SampleRateConversionQuality,
    ) -> SourceResult<AudioSource> {
        let path = self.asset_path(asset);
        let start = std::time::Instant::now();

        let (samples, native) = decode_file(&path)?;
        if samples.is_empty() {
            return Err(SourceError::Empty(asset.to_string()));
        }

        let samples = remap_channels(&samples, native.channel_count, target.channel_count);
        let samples = resample(
            &samples,
            target.channel_count,
            native.sample_rate,
            target.sample_rate,
            quality,
        )?;

        let source = AudioSource::from_interleaved(asset, samples, target)?;
        log::info!(
            "Decoded {} ({} ch @ {}Hz -> {} ch @ {}Hz, {} frames) in {:?}",
            asset,
            native.channel_count,
            native.sample_rate,
            target.channel_count,
            target.sample_rate,
            source.frame_count(),
            start.elapsed()
        );
        Ok(source)
    }
}

/// Decode a whole file to interleaved `f32` at its native format
pub fn decode_file(path: &Path) -> SourceResult<(Vec<Sample>, AudioProperties)> {
    let file = File::open(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SourceError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SourceError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SourceError::UnsupportedFormat("Unknown sample rate".to_string()))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SourceError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("Error reading packet from {:?}: {}", path, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(SourceError::UnsupportedFormat(e.to_string())),
        };

        // Packets may grow past the first one's capacity
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;
        let needed = decoded.capacity() * spec.channels.count();
        if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }
        channels = spec.channels.count() as u16;

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if channels == 0 {
        return Err(SourceError::UnsupportedFormat("Track has no channels".to_string()));
    }

    Ok((samples, AudioProperties::new(channels, sample_rate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal 16-bit PCM WAV writer for fixtures
    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[i16]) {
        let data_len = (frames.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in frames {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn test_missing_asset_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = AssetDecoder::new(dir.path());
        let result = decoder.decode(
            "CLAP.mp3",
            AudioProperties::default(),
            SampleRateConversionQuality::Medium,
        );
        assert!(matches!(result, Err(SourceError::Io { .. })));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("noise.mp3"), b"definitely not audio").unwrap();
        let decoder = AssetDecoder::new(dir.path());
        let result = decoder.decode(
            "noise.mp3",
            AudioProperties::default(),
            SampleRateConversionQuality::Medium,
        );
        assert!(matches!(result, Err(SourceError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_mono_wav_is_converted_to_stream_layout() {
        let dir = tempfile::tempdir().unwrap();
        let pcm: Vec<i16> = (0..4800).map(|i| if i % 2 == 0 { 8192 } else { -8192 }).collect();
        write_wav(&dir.path().join("click.wav"), 1, 48000, &pcm);

        let decoder = AssetDecoder::new(dir.path());
        let source = decoder
            .decode("click.wav", AudioProperties::new(2, 48000), SampleRateConversionQuality::None)
            .unwrap();

        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.frame_count(), 4800);
        let data = source.data();
        assert!((data[0] - 0.25).abs() < 1e-3);
        assert_eq!(data[0], data[1]);
        assert!((data[2] + 0.25).abs() < 1e-3);
    }
}
