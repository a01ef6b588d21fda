//! One-sided power spectral density estimators.
//!
//! Both estimators remove the mean (constant detrend) and use density
//! scaling, so the result is in units of power per Hz. For an `n`-point
//! transform the one-sided output has `n / 2 + 1` bins; every bin except DC
//! (and Nyquist, for even `n`) is doubled to fold in the negative frequencies.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use crate::params::PeriodogramMethod;

/// Reusable FFT state for spectral density estimation
pub struct SpectralDensity {
    planner: FftPlanner<f64>,
    spectrum: Vec<Complex<f64>>,
    segment: Vec<f64>,
}

impl Default for SpectralDensity {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralDensity {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            spectrum: Vec::new(),
            segment: Vec::new(),
        }
    }

    /// Estimate the density of `samples` with `method`.
    ///
    /// `bin_count` only matters for Welch, where it sets the segment length.
    pub fn estimate(
        &mut self,
        method: PeriodogramMethod,
        samples: &[f64],
        sample_rate_hz: f64,
        bin_count: usize,
    ) -> Vec<f64> {
        match method {
            PeriodogramMethod::Simple => self.periodogram(samples, sample_rate_hz),
            PeriodogramMethod::Welch => {
                let segment_len = welch_segment_len(samples.len(), bin_count);
                self.welch(samples, sample_rate_hz, segment_len)
            }
        }
    }

    /// Single rectangular-window periodogram over all samples
    pub fn periodogram(&mut self, samples: &[f64], sample_rate_hz: f64) -> Vec<f64> {
        let n = samples.len();
        let mut density = vec![0.0; one_sided_len(n)];
        if n == 0 {
            return density;
        }

        let mean = mean(samples);
        self.segment.clear();
        self.segment.extend(samples.iter().map(|s| s - mean));

        // Rectangular window: sum of squared weights is n
        let scale = 1.0 / (sample_rate_hz * n as f64);
        self.accumulate_power(scale, &mut density);
        density
    }

    /// Welch's method: mean of Hann-windowed periodograms over half-overlapping
    /// segments of `segment_len` samples.
    ///
    /// A segment longer than the input is shortened to the input length. A
    /// zero segment length yields an empty density.
    pub fn welch(&mut self, samples: &[f64], sample_rate_hz: f64, segment_len: usize) -> Vec<f64> {
        let segment_len = segment_len.min(samples.len());
        if segment_len == 0 {
            return Vec::new();
        }

        let overlap = segment_len / 2;
        let step = segment_len - overlap;
        let segment_count = (samples.len() - overlap) / step;

        let window: Vec<f64> = (0..segment_len)
            .map(|i| hann_periodic(i, segment_len))
            .collect();
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (sample_rate_hz * window_power);

        let mut density = vec![0.0; one_sided_len(segment_len)];
        for segment in 0..segment_count {
            let start = segment * step;
            let chunk = &samples[start..start + segment_len];
            let mean = mean(chunk);

            self.segment.clear();
            self.segment
                .extend(chunk.iter().zip(&window).map(|(s, w)| (s - mean) * w));
            self.accumulate_power(scale, &mut density);
        }

        for value in density.iter_mut() {
            *value /= segment_count as f64;
        }
        density
    }

    /// Add the scaled one-sided power of `self.segment` into `density`
    fn accumulate_power(&mut self, scale: f64, density: &mut [f64]) {
        let n = self.segment.len();
        let fft = self.planner.plan_fft_forward(n);

        self.spectrum.clear();
        self.spectrum
            .extend(self.segment.iter().map(|&s| Complex::new(s, 0.0)));
        fft.process(&mut self.spectrum);

        let last = density.len() - 1;
        for (k, value) in density.iter_mut().enumerate() {
            let mut power = self.spectrum[k].norm_sqr() * scale;
            let is_nyquist = n % 2 == 0 && k == last;
            if k != 0 && !is_nyquist {
                power *= 2.0;
            }
            *value += power;
        }
    }
}

/// Welch segment length for `bin_count` bins: `floor(sample_count / bin_count / 2)`
pub fn welch_segment_len(sample_count: usize, bin_count: usize) -> usize {
    if bin_count == 0 {
        return 0;
    }
    sample_count / bin_count / 2
}

/// Number of bins `method` produces for `sample_count` samples and `bin_count` seeds
pub fn natural_bin_count(method: PeriodogramMethod, sample_count: usize, bin_count: usize) -> usize {
    match method {
        PeriodogramMethod::Simple => one_sided_len(sample_count),
        PeriodogramMethod::Welch => {
            let segment_len = welch_segment_len(sample_count, bin_count).min(sample_count);
            if segment_len == 0 {
                0
            } else {
                one_sided_len(segment_len)
            }
        }
    }
}

fn one_sided_len(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        n / 2 + 1
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Periodic Hann window (as used for spectral analysis)
pub fn hann_periodic(index: usize, size: usize) -> f64 {
    if size <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f64) / size as f64).cos()
}
