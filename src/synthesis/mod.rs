//! Latent synthesis: spectral weights to images.
//!
//! Each seed owns a fixed noise vector. A weight vector mixes them, the mix
//! is normalised and mapped to per-layer latents, pulled toward the model's
//! average latent (truncation trick) and rendered by the synthesis network.

mod latent;
mod model;
mod noise;

pub use latent::{normalise, seed_noise, truncate, LatentSynthesizer, NoiseBasis};
pub use model::{
    Dense, GenerativeModel, Network, NetworkSnapshot, StyledLayer, SynthesisWeights,
    AVERAGE_LATENT,
};
pub use noise::NoiseGenerator;
