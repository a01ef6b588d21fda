//! Spectral estimator: drains audio batches and yields per-seed weights.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, trace};

use super::periodogram::{natural_bin_count, SpectralDensity};
use super::rebin;
use crate::audio::{AudioFrame, SampleBuffer};
use crate::error::{Error, Result};
use crate::params::SpectralConfig;
use crate::pipeline::WeightSource;

/// Turns batches of buffered audio into spectral weight vectors
pub struct SpectralEstimator {
    config: SpectralConfig,
    buffer: SampleBuffer,
    bin_count: usize,
    density: SpectralDensity,
    mono: Vec<f64>,
}

/// Fail unless `config` can produce `bin_count` weights per batch
pub fn check_bin_count(config: &SpectralConfig, bin_count: usize) -> Result<()> {
    config.validate()?;
    if bin_count == 0 {
        return Err(Error::InvalidConfig("bin count must be > 0".to_string()));
    }

    let available = natural_bin_count(config.method, config.samples_per_image, bin_count);
    if available < bin_count {
        return Err(Error::TooManySeeds {
            available,
            requested: bin_count,
        });
    }
    Ok(())
}

impl SpectralEstimator {
    /// Create an estimator producing `bin_count` weights per batch.
    ///
    /// Fails up front if the configured estimator cannot produce that many bins.
    pub fn new(config: SpectralConfig, buffer: SampleBuffer, bin_count: usize) -> Result<Self> {
        check_bin_count(&config, bin_count)?;

        Ok(Self {
            mono: Vec::with_capacity(config.samples_per_image),
            config,
            buffer,
            bin_count,
            density: SpectralDensity::new(),
        })
    }

    /// Weights for one batch of frames
    pub fn weights_for(&mut self, frames: &[AudioFrame]) -> Result<Vec<f64>> {
        self.mono.clear();
        self.mono.extend(frames.iter().map(AudioFrame::mono));

        debug!(
            method = ?self.config.method,
            samples = self.mono.len(),
            "running periodogram"
        );
        let density = self.density.estimate(
            self.config.method,
            &self.mono,
            self.config.sample_rate_hz as f64,
            self.bin_count,
        );
        debug!(raw_bins = density.len(), "raw periodogram size");

        let weights = rebin(&density, self.bin_count)?;
        trace!(?weights, "weights");
        Ok(weights)
    }
}

impl WeightSource for SpectralEstimator {
    /// Wait for a full batch, polling until one is buffered or `cancel` is set
    fn next_weights(&mut self, cancel: &AtomicBool) -> Result<Option<Vec<f64>>> {
        let frames = loop {
            if cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if let Some(frames) = self.buffer.pop_batch(self.config.samples_per_image) {
                break frames;
            }
            thread::sleep(self.config.poll_interval);
        };
        debug!(
            remaining = self.buffer.len(),
            dropped = self.buffer.dropped_frames(),
            "samples left in buffer"
        );

        self.weights_for(&frames).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PeriodogramMethod;
    use std::time::Duration;

    fn config(method: PeriodogramMethod, samples_per_image: usize) -> SpectralConfig {
        SpectralConfig {
            method,
            samples_per_image,
            sample_rate_hz: 48_000,
            poll_interval: Duration::from_millis(1),
        }
    }

    fn fill(buffer: &SampleBuffer, frames: usize) {
        let left: Vec<i32> = (0..frames as i32).map(|i| (i % 7) * 1000).collect();
        let right: Vec<i32> = (0..frames as i32).map(|i| (i % 3) * -500).collect();
        buffer.push_planar(left, right);
    }

    #[test]
    fn test_yields_bin_count_weights() {
        let buffer = SampleBuffer::with_capacity(8192);
        fill(&buffer, 4096);
        let mut estimator =
            SpectralEstimator::new(config(PeriodogramMethod::Simple, 2048), buffer.clone(), 10)
                .unwrap();

        let cancel = AtomicBool::new(false);
        let weights = estimator.next_weights(&cancel).unwrap().unwrap();
        assert_eq!(weights.len(), 10);
        assert_eq!(buffer.len(), 2048); // one batch consumed, not replayed
    }

    #[test]
    fn test_welch_yields_bin_count_weights() {
        let buffer = SampleBuffer::with_capacity(4096);
        fill(&buffer, 2048);
        let mut estimator =
            SpectralEstimator::new(config(PeriodogramMethod::Welch, 2048), buffer, 8).unwrap();
        let weights = estimator
            .next_weights(&AtomicBool::new(false))
            .unwrap()
            .unwrap();
        assert_eq!(weights.len(), 8);
    }

    #[test]
    fn test_too_many_seeds_for_resolution() {
        let buffer = SampleBuffer::with_capacity(64);
        // 16 samples give 9 simple-periodogram bins
        let err = SpectralEstimator::new(config(PeriodogramMethod::Simple, 16), buffer.clone(), 12)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::TooManySeeds {
                available: 9,
                requested: 12
            }
        ));

        // 2048 / 30 / 2 = 34-sample segments give 18 Welch bins
        let err = SpectralEstimator::new(config(PeriodogramMethod::Welch, 2048), buffer, 30)
            .err()
            .unwrap();
        assert!(err.to_string().contains("increase samples per image"));
    }

    #[test]
    fn test_cancel_while_waiting() {
        let buffer = SampleBuffer::with_capacity(64);
        let mut estimator =
            SpectralEstimator::new(config(PeriodogramMethod::Simple, 32), buffer, 2).unwrap();
        let cancel = AtomicBool::new(true);
        assert!(estimator.next_weights(&cancel).unwrap().is_none());
    }

    #[test]
    fn test_waits_for_producer() {
        let buffer = SampleBuffer::with_capacity(256);
        let producer = buffer.clone();
        let mut estimator =
            SpectralEstimator::new(config(PeriodogramMethod::Simple, 128), buffer, 4).unwrap();

        let handle = thread::spawn(move || {
            for _ in 0..4 {
                thread::sleep(Duration::from_millis(5));
                fill(&producer, 32);
            }
        });

        let weights = estimator
            .next_weights(&AtomicBool::new(false))
            .unwrap()
            .unwrap();
        assert_eq!(weights.len(), 4);
        handle.join().unwrap();
    }
}
