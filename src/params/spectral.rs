//! Spectral analysis and sample buffer configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Algorithm used to estimate spectral density
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PeriodogramMethod {
    /// Single-window periodogram over the whole batch
    Simple,

    /// Welch's method over half-overlapping Hann-windowed segments
    Welch,
}

/// Spectral estimator configuration
#[derive(Debug, Clone)]
pub struct SpectralConfig {
    pub method: PeriodogramMethod,

    /// Stereo frames consumed per generated image.
    /// Also sets frequency resolution: bin width = sample_rate / samples_per_image
    pub samples_per_image: usize,

    /// Audio sample rate (Hz). Must match the source; never verified at runtime
    pub sample_rate_hz: u32,

    /// Sleep between buffer checks while waiting for enough samples
    pub poll_interval: Duration,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            method: PeriodogramMethod::Simple,
            samples_per_image: 2048, // ~23.4 images/s at 48 kHz
            sample_rate_hz: 48_000,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl SpectralConfig {
    /// Expected image rate if inference keeps up with the audio
    pub fn images_per_second(&self) -> f32 {
        self.sample_rate_hz as f32 / self.samples_per_image as f32
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples_per_image == 0 {
            return Err(Error::InvalidConfig(
                "samples per image must be > 0".to_string(),
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err(Error::InvalidConfig("sample rate must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Shared sample buffer sizing
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum buffered stereo frames before the oldest are dropped
    pub capacity_frames: usize,
}

impl BufferConfig {
    pub fn from_seconds(seconds: f32, sample_rate_hz: u32) -> Self {
        Self {
            capacity_frames: (seconds.max(0.0) * sample_rate_hz as f32).ceil() as usize,
        }
    }

    /// The buffer must be able to hold at least one image's worth of frames
    pub fn validate(&self, spectral: &SpectralConfig) -> Result<()> {
        if self.capacity_frames < spectral.samples_per_image {
            return Err(Error::InvalidConfig(format!(
                "sample buffer holds {} frames but {} are needed per image; increase --buffer-seconds",
                self.capacity_frames, spectral.samples_per_image
            )));
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::from_seconds(10.0, SpectralConfig::default().sample_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_image_rate() {
        let config = SpectralConfig::default();
        assert!((config.images_per_second() - 23.4375).abs() < 1e-4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_samples_rejected() {
        let config = SpectralConfig {
            samples_per_image: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_buffer_must_fit_one_image() {
        let spectral = SpectralConfig::default();
        assert!(BufferConfig::from_seconds(0.01, 48_000)
            .validate(&spectral)
            .is_err());
        assert!(BufferConfig::default().validate(&spectral).is_ok());
        assert_eq!(BufferConfig::from_seconds(1.0, 48_000).capacity_frames, 48_000);
    }
}
