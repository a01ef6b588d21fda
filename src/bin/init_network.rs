//! Write a deterministic randomly-initialised generator network artifact.
//!
//! The visualiser needs a network to render; this creates one that is fully
//! determined by its shape and seed, with the average latent estimated.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use spectral_visualiser::params::NetworkParams;
use spectral_visualiser::synthesis::Network;

#[derive(Parser, Debug)]
#[command(name = "init-network")]
#[command(about = "Create a generator network artifact for spectral-visualiser", long_about = None)]
struct Args {
    /// Output path for the JSON artifact
    output: PathBuf,

    /// Seed for all weights and the constant noise inputs
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Input latent dimension
    #[arg(long, default_value_t = 64)]
    latent_dim: usize,

    /// Hidden width (also the per-layer latent dimension)
    #[arg(long, default_value_t = 32)]
    hidden: usize,

    /// Styled synthesis layers
    #[arg(long, default_value_t = 4)]
    layers: usize,

    /// Dense layers in the mapping network
    #[arg(long, default_value_t = 4)]
    mapping_layers: usize,

    /// Output image side length in pixels
    #[arg(long, default_value_t = 256)]
    resolution: u32,

    /// Random latents averaged into dlatent_avg
    #[arg(long, default_value_t = 1024)]
    average_samples: usize,
}

impl Args {
    fn network_params(&self) -> NetworkParams {
        NetworkParams {
            latent_dim: self.latent_dim,
            hidden: self.hidden,
            layers: self.layers,
            mapping_layers: self.mapping_layers,
            resolution: self.resolution,
            average_samples: self.average_samples,
            ..NetworkParams::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let params = args.network_params();
    info!(seed = args.seed, ?params, "initialising network");

    let network = Network::initialise(&params, args.seed).context("failed to build network")?;
    network
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!("Wrote {}", args.output.display());
    Ok(())
}
