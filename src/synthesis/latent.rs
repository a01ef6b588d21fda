//! Per-seed noise basis and the spectrum-weighted latent synthesizer.

use std::sync::Arc;

use image::RgbImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::{debug, warn};

use super::model::{GenerativeModel, AVERAGE_LATENT};
use crate::error::{Error, Result};
use crate::params::SynthesisConfig;
use crate::seeds::Seed;

/// Standard-normal noise vector determined entirely by `seed`
pub fn seed_noise(seed: Seed, dim: usize) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    (0..dim).map(|_| rng.sample(StandardNormal)).collect()
}

/// One noise vector per seed, in seed order
#[derive(Debug, Clone)]
pub struct NoiseBasis {
    dim: usize,
    vectors: Vec<Vec<f64>>,
}

impl NoiseBasis {
    pub fn new(seeds: &[Seed], dim: usize) -> Self {
        Self {
            dim,
            vectors: seeds.iter().map(|&seed| seed_noise(seed, dim)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// `sum_i(weights[i] * noise[i])`
    pub fn weighted_sum(&self, weights: &[f64]) -> Result<Vec<f64>> {
        if weights.len() != self.vectors.len() {
            return Err(Error::WeightCountMismatch {
                expected: self.vectors.len(),
                actual: weights.len(),
            });
        }

        let mut sum = vec![0.0; self.dim];
        for (weight, vector) in weights.iter().zip(&self.vectors) {
            for (acc, v) in sum.iter_mut().zip(vector) {
                *acc += weight * v;
            }
        }
        Ok(sum)
    }

    /// Weighted sum scaled to unit Euclidean length
    pub fn blend(&self, weights: &[f64]) -> Result<Vec<f32>> {
        normalise(&self.weighted_sum(weights)?)
    }
}

/// Scale `v` to unit L2 norm. A zero or non-finite norm is an error.
pub fn normalise(v: &[f64]) -> Result<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::DegenerateLatent(norm));
    }
    Ok(v.iter().map(|x| (x / norm) as f32).collect())
}

/// Truncation trick: `avg + (latent - avg) * psi` for every layer
pub fn truncate(latents: &mut [Vec<f32>], average: &[f32], psi: f32) -> Result<()> {
    for layer in latents.iter_mut() {
        if layer.len() != average.len() {
            return Err(Error::Model(format!(
                "layer latent has {} components but {} has {}",
                layer.len(),
                AVERAGE_LATENT,
                average.len()
            )));
        }
        for (w, avg) in layer.iter_mut().zip(average) {
            *w = avg + (*w - avg) * psi;
        }
    }
    Ok(())
}

/// Renders one image per spectral weight vector for a fixed seed set
pub struct LatentSynthesizer {
    model: Arc<dyn GenerativeModel>,
    basis: NoiseBasis,
    average: Vec<f32>,
    truncation_psi: f32,
}

impl LatentSynthesizer {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        seeds: &[Seed],
        config: &SynthesisConfig,
    ) -> Result<Self> {
        if seeds.is_empty() {
            return Err(Error::InvalidConfig(
                "synthesizer needs at least one seed".to_string(),
            ));
        }
        if !config.psi_in_recommended_range() {
            warn!(
                psi = config.truncation_psi,
                "truncation psi outside [0, 1]; images will be extrapolated"
            );
        }

        let average = model
            .variable(AVERAGE_LATENT)
            .ok_or_else(|| Error::Model(format!("model has no '{}' variable", AVERAGE_LATENT)))?
            .to_vec();
        let basis = NoiseBasis::new(seeds, model.latent_dim());
        debug!(seeds = basis.len(), dim = model.latent_dim(), "noise basis ready");

        Ok(Self {
            model,
            basis,
            average,
            truncation_psi: config.truncation_psi,
        })
    }

    /// Blend, map and truncate: the per-layer latents fed to synthesis
    pub fn latents_for(&self, weights: &[f64]) -> Result<Vec<Vec<f32>>> {
        let z = self.basis.blend(weights)?;
        let mut latents = self.model.map(&z)?;
        truncate(&mut latents, &self.average, self.truncation_psi)?;
        Ok(latents)
    }

    /// Exactly one image for one weight vector
    pub fn render(&self, weights: &[f64]) -> Result<RgbImage> {
        let latents = self.latents_for(weights)?;
        self.model.synthesize(&latents)
    }
}
