//! Generator network: mapping and synthesis sub-networks plus named variables.
//!
//! The mapping sub-network turns an input latent `z` into one intermediate
//! latent per synthesis layer. The synthesis sub-network is a coordinate
//! network: every pixel's (x, y, r) position is pushed through styled layers
//! whose activations are modulated by that layer's latent, then converted to
//! RGB. Networks are stored as JSON snapshots.

use std::collections::BTreeMap;
use std::path::Path;

use image::RgbImage;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::noise::NoiseGenerator;
use crate::error::{Error, Result};
use crate::params::NetworkParams;

/// Name of the learned average intermediate latent
pub const AVERAGE_LATENT: &str = "dlatent_avg";

/// Slope of the leaky ReLU used throughout
const LRELU_SLOPE: f32 = 0.2;

/// Pixel coordinate features: x, y, radius, constant
const COORD_FEATURES: usize = 4;

const RGB_CHANNELS: usize = 3;

/// A pretrained image generator as consumed by the latent synthesizer
pub trait GenerativeModel: Send + Sync {
    /// Dimension of the input latent `z`
    fn latent_dim(&self) -> usize;

    /// Number of per-layer intermediate latents `map` produces
    fn num_layers(&self) -> usize;

    /// Named model variable, e.g. [`AVERAGE_LATENT`]
    fn variable(&self, name: &str) -> Option<&[f32]>;

    /// Mapping sub-network: `z` to per-layer latents `[layer][component]`
    fn map(&self, z: &[f32]) -> Result<Vec<Vec<f32>>>;

    /// Synthesis sub-network: per-layer latents to an RGB image
    fn synthesize(&self, latents: &[Vec<f32>]) -> Result<RgbImage>;
}

/// Fully connected layer, weights row-major `[outputs][inputs]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub inputs: usize,
    pub outputs: usize,
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
}

impl Dense {
    /// Normal-initialised layer with weights scaled by `gain / sqrt(inputs)`
    fn initialise(rng: &mut ChaCha8Rng, inputs: usize, outputs: usize, gain: f32, bias: f32) -> Self {
        let scale = gain / (inputs as f32).sqrt();
        let weight = (0..inputs * outputs)
            .map(|_| rng.sample::<f32, _>(StandardNormal) * scale)
            .collect();
        Self {
            inputs,
            outputs,
            weight,
            bias: vec![bias; outputs],
        }
    }

    fn check(&self, name: &str, inputs: usize, outputs: usize) -> Result<()> {
        if inputs == 0 || outputs == 0 {
            return Err(Error::Model(format!("{} has a zero-width dimension", name)));
        }
        if self.inputs != inputs || self.outputs != outputs {
            return Err(Error::Model(format!(
                "{} is {}x{}, expected {}x{}",
                name, self.inputs, self.outputs, inputs, outputs
            )));
        }
        if self.weight.len() != inputs * outputs || self.bias.len() != outputs {
            return Err(Error::Model(format!(
                "{} has {} weights and {} biases for a {}x{} layer",
                name,
                self.weight.len(),
                self.bias.len(),
                inputs,
                outputs
            )));
        }
        Ok(())
    }

    fn forward(&self, x: &[f32], out: &mut [f32]) {
        for (o, (row, bias)) in out
            .iter_mut()
            .zip(self.weight.chunks_exact(self.inputs).zip(&self.bias))
        {
            *o = row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + bias;
        }
    }
}

/// One synthesis layer: style affine plus modulated dense transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyledLayer {
    /// Intermediate latent to per-channel scales
    pub style: Dense,
    pub dense: Dense,
    pub noise_strength: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisWeights {
    /// Coordinate features to hidden activations
    pub input: Dense,
    pub layers: Vec<StyledLayer>,
    pub to_rgb: Dense,
    pub noise_seed: u32,
    /// Noise cycles per image side
    pub noise_frequency: f64,
}

/// Serialised network artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub latent_dim: usize,
    pub dlatent_dim: usize,
    pub resolution: u32,
    pub mapping: Vec<Dense>,
    pub synthesis: SynthesisWeights,
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<f32>>,
}

impl NetworkSnapshot {
    fn validate(&self) -> Result<()> {
        if self.latent_dim == 0 || self.dlatent_dim == 0 || self.resolution == 0 {
            return Err(Error::Model(
                "latent dimensions and resolution must be > 0".to_string(),
            ));
        }
        if self.mapping.is_empty() || self.synthesis.layers.is_empty() {
            return Err(Error::Model(
                "network needs mapping and synthesis layers".to_string(),
            ));
        }

        for (i, layer) in self.mapping.iter().enumerate() {
            let inputs = if i == 0 {
                self.latent_dim
            } else {
                self.dlatent_dim
            };
            layer.check(&format!("mapping[{}]", i), inputs, self.dlatent_dim)?;
        }

        let synthesis = &self.synthesis;
        let hidden = synthesis.input.outputs;
        synthesis
            .input
            .check("synthesis.input", COORD_FEATURES, hidden)?;
        for (i, layer) in synthesis.layers.iter().enumerate() {
            layer
                .style
                .check(&format!("synthesis[{}].style", i), self.dlatent_dim, hidden)?;
            layer
                .dense
                .check(&format!("synthesis[{}].dense", i), hidden, hidden)?;
        }
        synthesis
            .to_rgb
            .check("synthesis.to_rgb", hidden, RGB_CHANNELS)?;

        for (name, values) in &self.variables {
            if name == AVERAGE_LATENT && values.len() != self.dlatent_dim {
                return Err(Error::Model(format!(
                    "{} has {} components, expected {}",
                    AVERAGE_LATENT,
                    values.len(),
                    self.dlatent_dim
                )));
            }
        }
        Ok(())
    }
}

/// CPU generator network
pub struct Network {
    snapshot: NetworkSnapshot,
    /// Constant noise image per synthesis layer
    noise_maps: Vec<Vec<f32>>,
}

impl Network {
    pub fn from_snapshot(snapshot: NetworkSnapshot) -> Result<Self> {
        snapshot.validate()?;
        let noise = NoiseGenerator::new(snapshot.synthesis.noise_seed);
        let noise_maps = (0..snapshot.synthesis.layers.len())
            .map(|layer| {
                noise.layer_map(
                    layer,
                    snapshot.resolution,
                    snapshot.synthesis.noise_frequency,
                )
            })
            .collect();
        Ok(Self {
            snapshot,
            noise_maps,
        })
    }

    /// Load a JSON network artifact
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading network from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let snapshot: NetworkSnapshot = serde_json::from_str(&text)?;
        let network = Self::from_snapshot(snapshot)?;
        if network.variable(AVERAGE_LATENT).is_none() {
            return Err(Error::Model(format!(
                "network artifact has no '{}' variable",
                AVERAGE_LATENT
            )));
        }
        debug!(
            latent_dim = network.snapshot.latent_dim,
            dlatent_dim = network.snapshot.dlatent_dim,
            layers = network.num_layers(),
            resolution = network.snapshot.resolution,
            "network loaded"
        );
        Ok(network)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(&self.snapshot).map_err(Error::NetworkEncode)?;
        std::fs::write(path, text).map_err(|e| Error::write(path, e))
    }

    /// Deterministic randomly-initialised network with an estimated average latent
    pub fn initialise(params: &NetworkParams, seed: u64) -> Result<Self> {
        params.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let hidden = params.hidden;
        let he_gain = 2.0f32.sqrt();

        let mapping = (0..params.mapping_layers)
            .map(|i| {
                let inputs = if i == 0 { params.latent_dim } else { hidden };
                Dense::initialise(&mut rng, inputs, hidden, he_gain, 0.0)
            })
            .collect();

        let input = Dense::initialise(&mut rng, COORD_FEATURES, hidden, he_gain, 0.0);
        let layers = (0..params.layers)
            .map(|_| StyledLayer {
                style: Dense::initialise(&mut rng, hidden, hidden, 0.5, 1.0),
                dense: Dense::initialise(&mut rng, hidden, hidden, he_gain, 0.0),
                noise_strength: 0.1,
            })
            .collect();
        let to_rgb = Dense::initialise(&mut rng, hidden, RGB_CHANNELS, 1.0, 0.0);

        let snapshot = NetworkSnapshot {
            latent_dim: params.latent_dim,
            dlatent_dim: hidden,
            resolution: params.resolution,
            mapping,
            synthesis: SynthesisWeights {
                input,
                layers,
                to_rgb,
                noise_seed: rng.random(),
                noise_frequency: params.noise_frequency,
            },
            variables: BTreeMap::new(),
        };
        let mut network = Self::from_snapshot(snapshot)?;

        let mut average = vec![0.0f32; hidden];
        for _ in 0..params.average_samples {
            let z: Vec<f32> = (0..params.latent_dim)
                .map(|_| rng.sample(StandardNormal))
                .collect();
            for (acc, w) in average.iter_mut().zip(network.map_one(&z)?) {
                *acc += w;
            }
        }
        for acc in average.iter_mut() {
            *acc /= params.average_samples as f32;
        }
        network
            .snapshot
            .variables
            .insert(AVERAGE_LATENT.to_string(), average);

        Ok(network)
    }

    pub fn resolution(&self) -> u32 {
        self.snapshot.resolution
    }

    pub fn dlatent_dim(&self) -> usize {
        self.snapshot.dlatent_dim
    }

    /// Mapping output before broadcasting to layers
    fn map_one(&self, z: &[f32]) -> Result<Vec<f32>> {
        if z.len() != self.snapshot.latent_dim {
            return Err(Error::Model(format!(
                "latent has {} components, expected {}",
                z.len(),
                self.snapshot.latent_dim
            )));
        }

        // Normalise to unit second moment
        let mean_sq = z.iter().map(|v| v * v).sum::<f32>() / z.len() as f32;
        let norm = (mean_sq + 1e-8).sqrt();
        let mut x: Vec<f32> = z.iter().map(|v| v / norm).collect();

        for layer in &self.snapshot.mapping {
            let mut out = vec![0.0; layer.outputs];
            layer.forward(&x, &mut out);
            out.iter_mut().for_each(|v| *v = leaky_relu(*v));
            x = out;
        }
        Ok(x)
    }

    /// Render rows `first_row..` into `pixels` (RGB, row-major)
    fn render_rows(&self, styles: &[Vec<f32>], first_row: usize, pixels: &mut [u8]) {
        let synthesis = &self.snapshot.synthesis;
        let hidden = synthesis.input.outputs;
        let size = self.snapshot.resolution as usize;

        let mut h = vec![0.0f32; hidden];
        let mut modulated = vec![0.0f32; hidden];
        let mut rgb = [0.0f32; RGB_CHANNELS];

        for (i, pixel) in pixels.chunks_exact_mut(RGB_CHANNELS).enumerate() {
            let index = first_row * size + i;
            let (px, py) = (index % size, index / size);
            let x = (px as f32 + 0.5) / size as f32 * 2.0 - 1.0;
            let y = (py as f32 + 0.5) / size as f32 * 2.0 - 1.0;
            let coords = [x, y, (x * x + y * y).sqrt(), 1.0];

            synthesis.input.forward(&coords, &mut h);
            h.iter_mut().for_each(|v| *v = leaky_relu(*v));

            for ((layer, style), noise) in synthesis.layers.iter().zip(styles).zip(&self.noise_maps) {
                for ((m, v), s) in modulated.iter_mut().zip(&h).zip(style) {
                    *m = v * s;
                }
                layer.dense.forward(&modulated, &mut h);
                let n = noise[index] * layer.noise_strength;
                h.iter_mut().for_each(|v| *v = leaky_relu(*v + n));
            }

            synthesis.to_rgb.forward(&h, &mut rgb);
            for (out, v) in pixel.iter_mut().zip(rgb) {
                *out = to_u8(v.tanh());
            }
        }
    }
}

impl GenerativeModel for Network {
    fn latent_dim(&self) -> usize {
        self.snapshot.latent_dim
    }

    fn num_layers(&self) -> usize {
        self.snapshot.synthesis.layers.len()
    }

    fn variable(&self, name: &str) -> Option<&[f32]> {
        self.snapshot.variables.get(name).map(Vec::as_slice)
    }

    fn map(&self, z: &[f32]) -> Result<Vec<Vec<f32>>> {
        let w = self.map_one(z)?;
        Ok(vec![w; self.num_layers()])
    }

    fn synthesize(&self, latents: &[Vec<f32>]) -> Result<RgbImage> {
        if latents.len() != self.num_layers() {
            return Err(Error::Model(format!(
                "got {} layer latents, expected {}",
                latents.len(),
                self.num_layers()
            )));
        }

        let hidden = self.snapshot.synthesis.input.outputs;
        let mut styles = Vec::with_capacity(latents.len());
        for (layer, w) in self.snapshot.synthesis.layers.iter().zip(latents) {
            if w.len() != self.snapshot.dlatent_dim {
                return Err(Error::Model(format!(
                    "layer latent has {} components, expected {}",
                    w.len(),
                    self.snapshot.dlatent_dim
                )));
            }
            let mut style = vec![0.0; hidden];
            layer.style.forward(w, &mut style);
            styles.push(style);
        }

        let size = self.snapshot.resolution as usize;
        let row_bytes = size * RGB_CHANNELS;
        let mut pixels = vec![0u8; size * row_bytes];

        // Pixels are independent, so the split does not affect the output
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(size);
        let rows_per_thread = size.div_ceil(threads);
        std::thread::scope(|scope| {
            for (chunk_index, chunk) in pixels.chunks_mut(rows_per_thread * row_bytes).enumerate() {
                let styles = &styles;
                scope.spawn(move || self.render_rows(styles, chunk_index * rows_per_thread, chunk));
            }
        });

        RgbImage::from_raw(size as u32, size as u32, pixels)
            .ok_or_else(|| Error::Model("synthesis produced a short pixel buffer".to_string()))
    }
}

fn leaky_relu(v: f32) -> f32 {
    if v >= 0.0 {
        v
    } else {
        v * LRELU_SLOPE
    }
}

/// Map [-1, 1] to [0, 255], rounding and clipping
fn to_u8(v: f32) -> u8 {
    ((v + 1.0) * 127.5 + 0.5).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> NetworkParams {
        NetworkParams {
            latent_dim: 8,
            hidden: 6,
            layers: 2,
            mapping_layers: 2,
            resolution: 12,
            average_samples: 16,
            noise_frequency: 3.0,
        }
    }

    #[test]
    fn test_initialise_is_deterministic() {
        let a = Network::initialise(&small_params(), 5).unwrap();
        let b = Network::initialise(&small_params(), 5).unwrap();
        assert_eq!(a.variable(AVERAGE_LATENT), b.variable(AVERAGE_LATENT));
        assert_eq!(a.variable(AVERAGE_LATENT).unwrap().len(), 6);
    }

    #[test]
    fn test_map_broadcasts_to_layers() {
        let network = Network::initialise(&small_params(), 1).unwrap();
        let layers = network.map(&[0.3; 8]).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], layers[1]);
        assert_eq!(layers[0].len(), 6);
    }

    #[test]
    fn test_map_rejects_wrong_latent_size() {
        let network = Network::initialise(&small_params(), 1).unwrap();
        assert!(matches!(network.map(&[1.0; 3]), Err(Error::Model(_))));
    }

    #[test]
    fn test_synthesize_resolution_and_determinism() {
        let network = Network::initialise(&small_params(), 2).unwrap();
        let latents = network.map(&[0.5; 8]).unwrap();
        let a = network.synthesize(&latents).unwrap();
        let b = network.synthesize(&latents).unwrap();
        assert_eq!(a.dimensions(), (12, 12));
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_synthesize_rejects_layer_count() {
        let network = Network::initialise(&small_params(), 2).unwrap();
        assert!(network.synthesize(&[vec![0.0; 6]]).is_err());
    }

    #[test]
    fn test_zero_width_synthesis_rejected() {
        let network = Network::initialise(&small_params(), 3).unwrap();
        let mut snapshot = network.snapshot.clone();
        let empty = |inputs, outputs| Dense {
            inputs,
            outputs,
            weight: Vec::new(),
            bias: Vec::new(),
        };
        snapshot.synthesis.input = empty(COORD_FEATURES, 0);
        for layer in snapshot.synthesis.layers.iter_mut() {
            layer.style = empty(6, 0);
            layer.dense = empty(0, 0);
        }
        snapshot.synthesis.to_rgb = empty(0, RGB_CHANNELS);

        let err = Network::from_snapshot(snapshot).err().unwrap();
        assert!(matches!(err, Error::Model(_)));
        assert!(err.to_string().contains("zero-width"));
    }

    #[test]
    fn test_save_to_missing_dir_is_write_error() {
        let network = Network::initialise(&small_params(), 3).unwrap();
        let path = std::env::temp_dir()
            .join("spectral-visualiser-missing-dir")
            .join("net.json");
        assert!(matches!(network.save(&path), Err(Error::Write { .. })));
    }

    #[test]
    fn test_snapshot_shape_validation() {
        let network = Network::initialise(&small_params(), 3).unwrap();
        let mut snapshot = network.snapshot.clone();
        snapshot.mapping[1].weight.pop();
        assert!(matches!(
            Network::from_snapshot(snapshot),
            Err(Error::Model(_))
        ));

        let mut snapshot = network.snapshot.clone();
        snapshot
            .variables
            .insert(AVERAGE_LATENT.to_string(), vec![0.0; 2]);
        assert!(Network::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_json_artifact_roundtrip_renders_identically() {
        let network = Network::initialise(&small_params(), 4).unwrap();
        let json = serde_json::to_string(&network.snapshot).unwrap();
        let restored = Network::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        let latents = network.map(&[0.1; 8]).unwrap();
        assert_eq!(
            network.synthesize(&latents).unwrap().as_raw(),
            restored.synthesize(&latents).unwrap().as_raw()
        );
    }

    #[test]
    fn test_to_u8_range() {
        assert_eq!(to_u8(-1.0), 0);
        assert_eq!(to_u8(1.0), 255);
        assert_eq!(to_u8(0.0), 128);
        assert_eq!(to_u8(3.0), 255);
    }
}
