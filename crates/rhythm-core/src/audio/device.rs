//! Output device discovery and stream negotiation
//!
//! `--list-devices` shows each output device on every host, with what would
//! happen if the configured stream were opened on it. The same selection
//! rules pick the device configuration when `CpalHost` really opens it.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, HostId, SampleFormat, SupportedStreamConfigRange};

use super::config::{AudioFormat, AudioStreamBuilder, DeviceId};
use super::error::{AudioError, AudioResult};

/// One supported configuration range, as far as stream negotiation cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRange {
    /// `None` for device formats the renderer can't write
    pub format: Option<AudioFormat>,
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
}

impl OutputRange {
    fn supports_rate(&self, rate: u32) -> bool {
        (self.min_rate..=self.max_rate).contains(&rate)
    }
}

impl From<&SupportedStreamConfigRange> for OutputRange {
    fn from(range: &SupportedStreamConfigRange) -> Self {
        Self {
            format: match range.sample_format() {
                SampleFormat::F32 => Some(AudioFormat::F32),
                SampleFormat::I16 => Some(AudioFormat::I16),
                _ => None,
            },
            channels: range.channels(),
            min_rate: range.min_sample_rate().0,
            max_rate: range.max_sample_rate().0,
        }
    }
}

/// Index of the range a stream request opens, in order of preference:
///
/// 1. requested format and channel count at the requested rate
/// 2. requested format and channel count at any rate
/// 3. any writable format with at least the requested channels
/// 4. any writable format
pub fn pick_range(ranges: &[OutputRange], request: &AudioStreamBuilder) -> Option<usize> {
    let same_layout =
        |r: &OutputRange| r.format == Some(request.format) && r.channels == request.channel_count;

    ranges
        .iter()
        .position(|r| same_layout(r) && r.supports_rate(request.sample_rate))
        .or_else(|| ranges.iter().position(same_layout))
        .or_else(|| {
            ranges
                .iter()
                .position(|r| r.format.is_some() && r.channels >= request.channel_count)
        })
        .or_else(|| ranges.iter().position(|r| r.format.is_some()))
}

/// Rate the stream runs at on `range`
///
/// The requested rate when the range covers it. Otherwise the closest rate
/// the range offers, if sources may be resampled.
pub fn negotiate_rate(range: &OutputRange, request: &AudioStreamBuilder) -> AudioResult<u32> {
    if range.supports_rate(request.sample_rate) {
        Ok(request.sample_rate)
    } else if request.conversion_quality.allows_conversion() {
        Ok(request.sample_rate.clamp(range.min_rate, range.max_rate))
    } else {
        Err(AudioError::UnsupportedSampleRate {
            requested: request.sample_rate,
            min: range.min_rate,
            max: range.max_rate,
        })
    }
}

/// What opening the configured stream on a device would give
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFit {
    /// Runs at the requested rate
    Native { channels: u16 },
    /// Runs at another rate; sources are resampled at load
    Resampled { channels: u16, sample_rate: u32 },
    /// Can't be opened with this configuration
    Unusable,
}

impl StreamFit {
    pub fn evaluate(ranges: &[OutputRange], request: &AudioStreamBuilder) -> Self {
        let Some(range) = pick_range(ranges, request).map(|i| ranges[i]) else {
            return StreamFit::Unusable;
        };
        match negotiate_rate(&range, request) {
            Ok(rate) if rate == request.sample_rate => StreamFit::Native {
                channels: range.channels,
            },
            Ok(rate) => StreamFit::Resampled {
                channels: range.channels,
                sample_rate: rate,
            },
            Err(_) => StreamFit::Unusable,
        }
    }
}

/// An output device and how it fits the configured stream
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Paste into `stream.device` in the config to select this device
    pub id: DeviceId,
    pub is_default: bool,
    pub fit: StreamFit,
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.display_label())?;
        if self.is_default {
            write!(f, " [default]")?;
        }
        match self.fit {
            StreamFit::Native { channels } => write!(f, ": {} ch", channels),
            StreamFit::Resampled {
                channels,
                sample_rate,
            } => write!(f, ": {} ch, resampled to {}Hz", channels, sample_rate),
            StreamFit::Unusable => write!(f, ": unusable with this config"),
        }
    }
}

/// Output devices of one host, with the host's default device name
fn host_output_devices(host_id: HostId) -> Option<(Vec<Device>, Option<String>)> {
    let host = cpal::host_from_id(host_id)
        .map_err(|e| log::debug!("Skipping audio host {:?}: {}", host_id, e))
        .ok()?;
    let devices = host
        .output_devices()
        .map_err(|e| log::debug!("No output devices on {:?}: {}", host_id, e))
        .ok()?;
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    Some((devices.collect(), default_name))
}

/// Every output device, evaluated against `request`
///
/// Defaults first, then usable devices, then by host and name.
pub fn get_output_devices(request: &AudioStreamBuilder) -> AudioResult<Vec<AudioDevice>> {
    let mut devices = Vec::new();

    for host_id in cpal::available_hosts() {
        let Some((host_devices, default_name)) = host_output_devices(host_id) else {
            continue;
        };
        for device in host_devices {
            let Ok(name) = device.name() else { continue };
            let ranges: Vec<OutputRange> = match device.supported_output_configs() {
                Ok(configs) => configs.map(|c| OutputRange::from(&c)).collect(),
                Err(_) => continue,
            };
            if ranges.is_empty() {
                continue;
            }
            devices.push(AudioDevice {
                is_default: default_name.as_deref() == Some(name.as_str()),
                id: DeviceId::with_host(&name, host_id.name()),
                fit: StreamFit::evaluate(&ranges, request),
            });
        }
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by_key(|d| {
        (
            !d.is_default,
            d.fit == StreamFit::Unusable,
            d.id.host.clone(),
            d.id.name.clone(),
        )
    });
    Ok(devices)
}

/// Resolve a configured device, on its host if one is named
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<Device> {
    cpal::available_hosts()
        .into_iter()
        .filter(|host_id| id.host.as_deref().map_or(true, |h| h == host_id.name()))
        .filter_map(host_output_devices)
        .flat_map(|(devices, _)| devices)
        .find(|d| d.name().ok().as_deref() == Some(id.name.as_str()))
        .ok_or_else(|| AudioError::DeviceNotFound(id.name.clone()))
}

/// The default host's default output device
pub fn get_cpal_default_device() -> AudioResult<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))
}
