//! Command-line argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser, ValueEnum};

use crate::params::{
    BufferConfig, PeriodogramMethod, RecordingConfig, SpectralConfig, SynthesisConfig,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "spectral-visualiser")]
#[command(about = "Audio-reactive generative image visualiser", long_about = None)]
#[command(group(ArgGroup::new("seed_source").required(true).args(["seeds_list", "seeds_file"])))]
pub struct Args {
    /// Audio source: input device name (or JACK client), "default" for the default input
    pub source: String,

    /// Generator network artifact (JSON, see `init-network`)
    pub network: PathBuf,

    /// Algorithm used to compute spectral density
    #[arg(short, long, value_enum)]
    pub periodogram: PeriodogramMethod,

    /// Comma-separated seeds and dash-separated ranges, e.g. "1,3,5-9".
    /// The first seed follows the lowest frequency bin, the last the highest.
    /// More seeds give a more detailed visualisation; most audio mainly
    /// drives the first few.
    #[arg(short = 's', long, value_name = "SEEDS")]
    pub seeds_list: Option<String>,

    /// YAML file with named seed sets and an optional starting set
    #[arg(short = 'f', long, value_name = "FILE")]
    pub seeds_file: Option<PathBuf>,

    /// Truncation psi. Lower values stay closer to the average image (better
    /// quality, less variety); higher values vary more.
    #[arg(long, value_name = "PSI", default_value_t = 0.75)]
    pub truncation_psi: f32,

    /// Audio frames per image. 2048 at 48 kHz gives ~23.4 images/s.
    /// Keep it a multiple of the audio callback size.
    #[arg(long, value_name = "FRAMES", default_value_t = 2048)]
    pub samples_per_image: usize,

    /// Source sample rate (Hz); must match the audio source
    #[arg(long, value_name = "HZ", default_value_t = 48_000)]
    pub sample_rate: u32,

    /// Audio host (e.g. alsa, jack, coreaudio); defaults to the platform host
    #[arg(long, value_name = "HOST")]
    pub audio_host: Option<String>,

    /// Seconds of audio buffered before the oldest frames are dropped
    #[arg(long, value_name = "SECONDS", default_value_t = 10.0)]
    pub buffer_seconds: f32,

    /// Save every displayed frame as PNG into this directory
    #[arg(long, value_name = "DIR")]
    pub save_frames: Option<PathBuf>,

    /// Log per-image diagnostics
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    pub fn spectral_config(&self) -> SpectralConfig {
        SpectralConfig {
            method: self.periodogram,
            samples_per_image: self.samples_per_image,
            sample_rate_hz: self.sample_rate,
            poll_interval: Duration::from_millis(1),
        }
    }

    pub fn synthesis_config(&self) -> SynthesisConfig {
        SynthesisConfig {
            truncation_psi: self.truncation_psi,
        }
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig::from_seconds(self.buffer_seconds, self.sample_rate)
    }

    /// Create recording configuration if frame saving is enabled
    pub fn recording_config(&self) -> Option<RecordingConfig> {
        self.save_frames.as_ref().map(RecordingConfig::new)
    }
}
