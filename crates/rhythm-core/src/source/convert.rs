//! Conversion of decoded PCM to the stream's format
//!
//! Channel remapping and sample rate conversion (rubato). Both run once per
//! asset on the loader thread, never on the audio thread.

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use super::{SourceError, SourceResult};
use crate::audio::SampleRateConversionQuality;
use crate::types::Sample;

/// Remap interleaved samples from `from` to `to` channels
///
/// Mono output averages every input channel. Otherwise output channel `j`
/// reads input channel `j`, or the last input channel when there are fewer
/// inputs (so mono is duplicated and surplus channels are dropped).
pub fn remap_channels(samples: &[Sample], from: u16, to: u16) -> Vec<Sample> {
    let (from, to) = (from as usize, to as usize);
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if to == 1 {
            out.push(frame.iter().sum::<Sample>() / from as Sample);
        } else {
            for ch in 0..to {
                out.push(frame[ch.min(from - 1)]);
            }
        }
    }

    out
}

/// Resample interleaved samples from `from_rate` to `to_rate`
///
/// Returns a copy when the rates match. The whole asset is processed as one
/// chunk; the resampler's delay is trimmed and its tail flushed so the output
/// lines up with the input and has `frames * to_rate / from_rate` frames.
pub fn resample(
    samples: &[Sample],
    channels: u16,
    from_rate: u32,
    to_rate: u32,
    quality: SampleRateConversionQuality,
) -> SourceResult<Vec<Sample>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 || channels == 0 {
        return Err(SourceError::Resample(format!(
            "invalid conversion {}Hz -> {}Hz with {} channels",
            from_rate, to_rate, channels
        )));
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let planar = deinterleave(samples, channels as usize);
    let input_frames = planar[0].len();
    let expected_frames = (input_frames as f64 * ratio).round() as usize;

    log::debug!(
        "Resampling {} frames from {}Hz to {}Hz ({:?} quality)",
        input_frames,
        from_rate,
        to_rate,
        quality
    );

    let channels = channels as usize;
    let planar_out = match quality {
        SampleRateConversionQuality::None => {
            return Err(SourceError::Resample(format!(
                "source is {}Hz, stream is {}Hz and conversion is disabled",
                from_rate, to_rate
            )));
        }
        SampleRateConversionQuality::Fastest | SampleRateConversionQuality::Low => {
            let resampler = polynomial(ratio, PolynomialDegree::Linear, input_frames, channels)?;
            run_to_completion(resampler, &planar, expected_frames)?
        }
        SampleRateConversionQuality::Medium => {
            let resampler = polynomial(ratio, PolynomialDegree::Cubic, input_frames, channels)?;
            run_to_completion(resampler, &planar, expected_frames)?
        }
        SampleRateConversionQuality::High => {
            run_to_completion(sinc(ratio, 128, input_frames, channels)?, &planar, expected_frames)?
        }
        SampleRateConversionQuality::Best => {
            run_to_completion(sinc(ratio, 256, input_frames, channels)?, &planar, expected_frames)?
        }
    };

    Ok(interleave(&planar_out))
}

fn polynomial(
    ratio: f64,
    degree: PolynomialDegree,
    chunk_size: usize,
    channels: usize,
) -> SourceResult<FastFixedIn<Sample>> {
    FastFixedIn::<Sample>::new(ratio, 1.0, degree, chunk_size, channels)
        .map_err(|e| SourceError::Resample(format!("Failed to create resampler: {}", e)))
}

fn sinc(
    ratio: f64,
    sinc_len: usize,
    chunk_size: usize,
    channels: usize,
) -> SourceResult<SincFixedIn<Sample>> {
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::<Sample>::new(ratio, 1.0, params, chunk_size, channels)
        .map_err(|e| SourceError::Resample(format!("Failed to create sinc resampler: {}", e)))
}

/// Process the whole input, flush the tail and trim the resampler delay
fn run_to_completion<R: Resampler<Sample>>(
    mut resampler: R,
    planar: &[Vec<Sample>],
    expected_frames: usize,
) -> SourceResult<Vec<Vec<Sample>>> {
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(planar, None)
        .map_err(|e| SourceError::Resample(e.to_string()))?;

    while output[0].len() < delay + expected_frames {
        let tail = resampler
            .process_partial(None::<&[Vec<Sample>]>, None)
            .map_err(|e| SourceError::Resample(e.to_string()))?;
        if tail[0].is_empty() {
            break;
        }
        for (channel, rest) in output.iter_mut().zip(tail) {
            channel.extend_from_slice(&rest);
        }
    }

    for channel in output.iter_mut() {
        let end = (delay + expected_frames).min(channel.len());
        let start = delay.min(end);
        *channel = channel[start..end].to_vec();
    }

    Ok(output)
}

/// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[Sample], channels: usize) -> Vec<Vec<Sample>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

/// [[L, L, ...], [R, R, ...]] -> [L, R, L, R, ...]
fn interleave(planar: &[Vec<Sample>]) -> Vec<Sample> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut out = Vec::with_capacity(frames * planar.len());
    for i in 0..frames {
        for channel in planar {
            out.push(channel[i]);
        }
    }
    out
}
