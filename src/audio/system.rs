//! Audio input system feeding the shared sample buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tracing::{info, warn};

use super::buffer::{decode_le_f32, decode_le_i16, decode_le_i32, SampleBuffer};
use crate::error::{Error, Result};

/// Device name that selects the host's default input
pub const DEFAULT_SOURCE: &str = "default";

/// Stereo channels read from the source
const CHANNELS: u16 = 2;

/// Sample formats we can decode, most preferred first
const PREFERRED_FORMATS: [SampleFormat; 3] = [SampleFormat::I32, SampleFormat::F32, SampleFormat::I16];

/// Live audio input pushing stereo frames into a [`SampleBuffer`]
pub struct AudioSystem {
    device_name: String,
    sample_format: SampleFormat,

    /// Input stream (kept alive)
    _stream: cpal::Stream,
}

impl AudioSystem {
    /// Open `source` on `host_name` (or the default host) and start streaming
    pub fn new(
        host_name: Option<&str>,
        source: &str,
        sample_rate_hz: u32,
        buffer: SampleBuffer,
    ) -> Result<Self> {
        let host = select_host(host_name)?;
        let device = select_device(&host, source)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string());

        let sample_format = pick_sample_format(&device, sample_rate_hz)?;
        let config = StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(sample_rate_hz),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            host = host.id().name(),
            device = %device_name,
            format = ?sample_format,
            sample_rate_hz,
            "opening audio input"
        );

        // Real-time thread: decode and push only. No logging, no allocation
        // beyond what the buffer reserved up front.
        let stream = device
            .build_input_stream_raw(
                &config,
                sample_format,
                move |data: &cpal::Data, _: &cpal::InputCallbackInfo| {
                    let bytes = data.bytes();
                    match data.sample_format() {
                        SampleFormat::I32 => buffer.push_interleaved(decode_le_i32(bytes)),
                        SampleFormat::F32 => buffer.push_interleaved(decode_le_f32(bytes)),
                        SampleFormat::I16 => buffer.push_interleaved(decode_le_i16(bytes)),
                        _ => {}
                    }
                },
                |err| warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Audio(format!("failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::Audio(format!("failed to start input stream: {}", e)))?;

        Ok(Self {
            device_name,
            sample_format,
            _stream: stream,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Input device names on `host_name` (or the default host)
    pub fn list_input_devices(host_name: Option<&str>) -> Result<Vec<String>> {
        let host = select_host(host_name)?;
        let devices = host
            .input_devices()
            .map_err(|e| Error::Audio(format!("no input devices available: {}", e)))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

fn select_host(name: Option<&str>) -> Result<cpal::Host> {
    let Some(name) = name else {
        return Ok(cpal::default_host());
    };

    let available = cpal::available_hosts();
    let id = available
        .iter()
        .copied()
        .find(|id| id.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let names: Vec<&str> = available.iter().map(|id| id.name()).collect();
            Error::Audio(format!(
                "audio host '{}' not available (available: {})",
                name,
                names.join(", ")
            ))
        })?;

    cpal::host_from_id(id).map_err(|e| Error::Audio(format!("audio host '{}': {}", name, e)))
}

fn select_device(host: &cpal::Host, source: &str) -> Result<cpal::Device> {
    if source == DEFAULT_SOURCE {
        return host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no default input device available".to_string()));
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| Error::Audio(format!("no input devices available: {}", e)))?;
    devices
        .find(|d| d.name().map(|n| n == source).unwrap_or(false))
        .ok_or_else(|| {
            let known = AudioSystem::list_input_devices(Some(host.id().name()))
                .map(|names| names.join(", "))
                .unwrap_or_default();
            Error::Audio(format!(
                "input device '{}' not found (available: {})",
                source, known
            ))
        })
}

/// Pick the first preferred format the device offers in stereo at `sample_rate_hz`
fn pick_sample_format(device: &cpal::Device, sample_rate_hz: u32) -> Result<SampleFormat> {
    let supported: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(format!("failed to query input configs: {}", e)))?
        .filter(|range| {
            range.channels() == CHANNELS
                && range.min_sample_rate().0 <= sample_rate_hz
                && range.max_sample_rate().0 >= sample_rate_hz
        })
        .map(|range| range.sample_format())
        .collect();

    PREFERRED_FORMATS
        .iter()
        .copied()
        .find(|format| supported.contains(format))
        .ok_or_else(|| {
            Error::Audio(format!(
                "device offers no stereo I32/F32/I16 input at {} Hz",
                sample_rate_hz
            ))
        })
}
