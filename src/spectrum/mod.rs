//! Spectral analysis: audio batches in, one weight per seed out.

mod estimator;
mod periodogram;

pub use estimator::{check_bin_count, SpectralEstimator};
pub use periodogram::{hann_periodic, natural_bin_count, welch_segment_len, SpectralDensity};

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Reduce a spectral density to exactly `bin_count` values.
///
/// - Same length: returned unchanged.
/// - Longer: split into `bin_count` contiguous chunks of `len / bin_count`
///   values and summed per chunk; the trailing `len % bin_count` values are
///   dropped.
/// - Shorter: too many seeds for this resolution.
pub fn rebin(density: &[f64], bin_count: usize) -> Result<Vec<f64>> {
    if bin_count == 0 {
        return Err(Error::InvalidConfig("bin count must be > 0".to_string()));
    }

    match density.len().cmp(&bin_count) {
        Ordering::Equal => Ok(density.to_vec()),
        Ordering::Greater => {
            let chunk_len = density.len() / bin_count;
            let summed: Vec<f64> = density[..chunk_len * bin_count]
                .chunks_exact(chunk_len)
                .map(|chunk| chunk.iter().sum())
                .collect();
            debug_assert_eq!(summed.len(), bin_count);
            Ok(summed)
        }
        Ordering::Less => Err(Error::TooManySeeds {
            available: density.len(),
            requested: bin_count,
        }),
    }
}
