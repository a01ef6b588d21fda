//! Spectral visualiser library - audio spectrum driven generative images
//!
//! Audio frames flow from the input stream into a bounded buffer, are turned
//! into one spectral weight per seed, and the weights mix per-seed latent
//! noise vectors that a generator network renders into frames.

pub mod audio;
pub mod cli;
pub mod display;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod rendering;
pub mod seeds;
pub mod spectrum;
pub mod synthesis;

pub use error::{Error, Result};
