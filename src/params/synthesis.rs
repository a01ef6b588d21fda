//! Latent synthesis and generator network parameters.

use crate::error::{Error, Result};

/// Latent synthesizer configuration
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Truncation trick strength.
    /// 0.0 = always the average latent, 1.0 = no truncation.
    /// Values outside [0, 1] are accepted and extrapolate
    pub truncation_psi: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            truncation_psi: 0.75,
        }
    }
}

impl SynthesisConfig {
    pub fn psi_in_recommended_range(&self) -> bool {
        (0.0..=1.0).contains(&self.truncation_psi)
    }
}

/// Shape of a freshly initialised generator network
#[derive(Debug, Clone)]
pub struct NetworkParams {
    /// Input latent (z) dimension; also the per-seed noise dimension
    pub latent_dim: usize,

    /// Hidden width of both sub-networks; also the intermediate latent (w) dimension
    pub hidden: usize,

    /// Styled synthesis layers (one intermediate latent each)
    pub layers: usize,

    /// Dense layers in the mapping sub-network
    pub mapping_layers: usize,

    /// Output image side length (pixels)
    pub resolution: u32,

    /// Random latents averaged to estimate `dlatent_avg`
    pub average_samples: usize,

    /// Spatial frequency of the constant per-layer noise inputs (cycles per image)
    pub noise_frequency: f64,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            latent_dim: 64,
            hidden: 32,
            layers: 4,
            mapping_layers: 4,
            resolution: 256,
            average_samples: 1024,
            noise_frequency: 6.0,
        }
    }
}

impl NetworkParams {
    pub fn validate(&self) -> Result<()> {
        if self.latent_dim == 0 || self.hidden == 0 {
            return Err(Error::InvalidConfig(
                "latent and hidden dimensions must be > 0".to_string(),
            ));
        }
        if self.layers == 0 || self.mapping_layers == 0 {
            return Err(Error::InvalidConfig(
                "network needs at least one mapping and one synthesis layer".to_string(),
            ));
        }
        if self.resolution == 0 {
            return Err(Error::InvalidConfig("resolution must be > 0".to_string()));
        }
        if self.average_samples == 0 {
            return Err(Error::InvalidConfig(
                "average latent needs at least one sample".to_string(),
            ));
        }
        Ok(())
    }
}
