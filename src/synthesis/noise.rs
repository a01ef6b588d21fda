//! Constant spatial noise inputs for the synthesis layers.
//!
//! Each styled layer adds a fixed noise image scaled by a learned strength.
//! The images are OpenSimplex samples, so a given seed always reproduces the
//! same maps and rendering stays deterministic.

use noise::{NoiseFn, OpenSimplex};

/// Noise generator for per-layer noise maps
pub struct NoiseGenerator {
    simplex: OpenSimplex,
}

impl NoiseGenerator {
    /// Create new noise generator with seed
    pub fn new(seed: u32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
        }
    }

    /// Sample 3D simplex noise at position
    ///
    /// Returns value in range [-1, 1]
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f32 {
        self.simplex.get([x, y, z]) as f32
    }

    /// Square noise image for `layer`, row-major, `frequency` cycles per side
    pub fn layer_map(&self, layer: usize, resolution: u32, frequency: f64) -> Vec<f32> {
        let size = resolution as usize;
        let depth = layer as f64 * 7.31;
        let mut map = Vec::with_capacity(size * size);
        for py in 0..size {
            let y = (py as f64 + 0.5) / size as f64 * frequency;
            for px in 0..size {
                let x = (px as f64 + 0.5) / size as f64 * frequency;
                map.push(self.sample_3d(x, y, depth));
            }
        }
        map
    }
}
