//! End-to-end pipeline scenarios with stub audio sources and a recording model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::RgbImage;

use spectral_visualiser::audio::{AudioFrame, SampleBuffer};
use spectral_visualiser::params::{PeriodogramMethod, SpectralConfig, SynthesisConfig};
use spectral_visualiser::pipeline::{PipelineController, PipelineEvent, WeightSource};
use spectral_visualiser::seeds::SeedRegistry;
use spectral_visualiser::spectrum::{check_bin_count, SpectralEstimator};
use spectral_visualiser::synthesis::{normalise, seed_noise, GenerativeModel, AVERAGE_LATENT};
use spectral_visualiser::{Error, Result};

const DIM: usize = 16;
const TIMEOUT: Duration = Duration::from_secs(5);

/// Model whose mapping is the identity; records every `z` it is given
struct RecordingModel {
    average: Vec<f32>,
    seen: Mutex<Vec<Vec<f32>>>,
    images: Mutex<usize>,
}

impl RecordingModel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            average: vec![0.0; DIM],
            seen: Mutex::new(Vec::new()),
            images: Mutex::new(0),
        })
    }

    fn seen(&self) -> Vec<Vec<f32>> {
        self.seen.lock().unwrap().clone()
    }
}

impl GenerativeModel for RecordingModel {
    fn latent_dim(&self) -> usize {
        DIM
    }

    fn num_layers(&self) -> usize {
        2
    }

    fn variable(&self, name: &str) -> Option<&[f32]> {
        (name == AVERAGE_LATENT).then_some(self.average.as_slice())
    }

    fn map(&self, z: &[f32]) -> Result<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().push(z.to_vec());
        Ok(vec![z.to_vec(); self.num_layers()])
    }

    fn synthesize(&self, latents: &[Vec<f32>]) -> Result<RgbImage> {
        assert_eq!(latents.len(), 2);
        *self.images.lock().unwrap() += 1;
        Ok(RgbImage::new(2, 2))
    }
}

/// Consumes real batches from the buffer but always reports equal weights
struct EqualWeights {
    buffer: SampleBuffer,
    batch: usize,
    bins: usize,
}

impl WeightSource for EqualWeights {
    fn next_weights(&mut self, cancel: &AtomicBool) -> Result<Option<Vec<f64>>> {
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if let Some(frames) = self.buffer.pop_batch(self.batch) {
                assert_eq!(frames.len(), self.batch);
                return Ok(Some(vec![0.5; self.bins]));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

fn expected_latent(weights: &[(u32, f64)]) -> Vec<f32> {
    let mut sum = vec![0.0; DIM];
    for &(seed, weight) in weights {
        for (acc, v) in sum.iter_mut().zip(seed_noise(seed, DIM)) {
            *acc += weight * v;
        }
    }
    normalise(&sum).unwrap()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-4, "{} vs {}", a, e);
    }
}

fn next_frame(controller: &PipelineController) -> spectral_visualiser::pipeline::Frame {
    match controller.next_timeout(TIMEOUT) {
        Some(PipelineEvent::Frame(frame)) => frame,
        other => panic!("expected a frame, got {:?}", other),
    }
}

#[test]
fn test_equal_weights_blend_both_seeds() {
    let model = RecordingModel::new();
    let buffer = SampleBuffer::with_capacity(64);
    for _ in 0..8 {
        buffer.push_planar([10, 10, 10, 10], [20, 20, 20, 20]);
    }

    let registry = SeedRegistry::from_list("0,1").unwrap();
    let source_buffer = buffer.clone();
    let mut controller = PipelineController::new(
        registry,
        model.clone(),
        SynthesisConfig {
            truncation_psi: 1.0,
        },
        move |set| {
            Ok(Box::new(EqualWeights {
                buffer: source_buffer.clone(),
                batch: 4,
                bins: set.len(),
            }) as Box<dyn WeightSource>)
        },
    );
    controller.start("default").unwrap();

    for expected in 0..3 {
        let frame = next_frame(&controller);
        assert_eq!(frame.index, expected);
        assert_eq!(frame.seed_set, "default");
        assert_eq!(frame.image.dimensions(), (2, 2));
    }
    controller.stop();

    // One mapping call per image, each with the same blended latent
    let seen = model.seen();
    assert!(seen.len() >= 3);
    assert_eq!(*model.images.lock().unwrap(), seen.len());
    let expected = expected_latent(&[(0, 0.5), (1, 0.5)]);
    for z in &seen {
        assert_close(z, &expected);
    }
    // Each image consumed one batch of four frames; a cancelled step may
    // have taken one more
    assert!(buffer.len() <= (8 - seen.len()) * 4);
    assert_eq!(buffer.len() % 4, 0);
}

#[test]
fn test_switching_uses_new_seed_set_only() {
    let model = RecordingModel::new();
    let registry = SeedRegistry::from_yaml_str(
        "start: a\nseeds:\n  a: \"0,1\"\n  b: [5, 6, 7]\n",
    )
    .unwrap();
    let mut controller = PipelineController::new(
        registry,
        model.clone(),
        SynthesisConfig {
            truncation_psi: 1.0,
        },
        |set| {
            let bins = set.len();
            Ok(Box::new(EqualWeights {
                buffer: {
                    let buffer = SampleBuffer::with_capacity(1024);
                    for _ in 0..64 {
                        buffer.push_planar([1], [1]);
                    }
                    buffer
                },
                batch: 1,
                bins,
            }) as Box<dyn WeightSource>)
        },
    );

    controller.start("a").unwrap();
    assert_eq!(next_frame(&controller).seed_set, "a");

    controller.start("b").unwrap();
    assert_eq!(controller.active_set(), Some("b"));
    let seen_before = model.seen().len();

    for _ in 0..3 {
        assert_eq!(next_frame(&controller).seed_set, "b");
    }
    controller.stop();

    let expected = expected_latent(&[(5, 0.5), (6, 0.5), (7, 0.5)]);
    for z in &model.seen()[seen_before..] {
        assert_close(z, &expected);
    }
}

#[test]
fn test_spectral_estimator_drives_high_seed() {
    let model = RecordingModel::new();
    let buffer = SampleBuffer::with_capacity(256);
    // Quarter-rate tone lands in the upper half of the spectrum
    for _ in 0..4 {
        buffer.push_planar([0, 1000, 0, -1000, 0, 1000, 0, -1000], [0; 8]);
    }

    let config = SpectralConfig {
        method: PeriodogramMethod::Simple,
        samples_per_image: 8,
        sample_rate_hz: 8,
        poll_interval: Duration::from_millis(1),
    };
    let registry = SeedRegistry::from_list("3,7").unwrap();
    let source_buffer = buffer.clone();
    let mut controller = PipelineController::new(
        registry,
        model.clone(),
        SynthesisConfig {
            truncation_psi: 1.0,
        },
        move |set| {
            let estimator = SpectralEstimator::new(config.clone(), source_buffer.clone(), set.len())?;
            Ok(Box::new(estimator) as Box<dyn WeightSource>)
        },
    );
    controller.start("default").unwrap();
    next_frame(&controller);
    controller.stop();

    let seen = model.seen();
    assert!(!seen.is_empty());
    assert_close(&seen[0], &expected_latent(&[(7, 1.0)]));
}

#[test]
fn test_switch_abandons_waiting_estimator() {
    let model = RecordingModel::new();
    let buffer = SampleBuffer::with_capacity(256);
    let config = SpectralConfig {
        method: PeriodogramMethod::Simple,
        samples_per_image: 8,
        sample_rate_hz: 8,
        poll_interval: Duration::from_millis(1),
    };
    let registry =
        SeedRegistry::from_yaml_str("start: a\nseeds:\n  a: [1, 2]\n  b: [5, 6]\n").unwrap();
    let source_buffer = buffer.clone();
    let mut controller = PipelineController::new(
        registry,
        model.clone(),
        SynthesisConfig {
            truncation_psi: 1.0,
        },
        move |set| {
            let estimator = SpectralEstimator::new(config.clone(), source_buffer.clone(), set.len())?;
            Ok(Box::new(estimator) as Box<dyn WeightSource>)
        },
    );

    // Set "a" is left polling an empty buffer
    controller.start("a").unwrap();
    assert!(controller.next_timeout(Duration::from_millis(50)).is_none());

    let switch_started = Instant::now();
    controller.start("b").unwrap();
    assert!(switch_started.elapsed() < Duration::from_secs(1));
    assert!(model.seen().is_empty());

    buffer.push_planar([0, 1000, 0, -1000, 0, 1000, 0, -1000], [0; 8]);
    let frame = next_frame(&controller);
    assert_eq!(frame.seed_set, "b");
    assert_eq!(frame.index, 0);
    controller.stop();

    // The only batch went to "b", driving its higher seed
    let seen = model.seen();
    assert_eq!(seen.len(), 1);
    assert_close(&seen[0], &expected_latent(&[(6, 1.0)]));
}

#[test]
fn test_every_seed_set_checked_against_spectrum() {
    let registry =
        SeedRegistry::from_yaml_str("start: small\nseeds:\n  small: \"1-3\"\n  large: \"1-20\"\n")
            .unwrap();
    let config = SpectralConfig {
        samples_per_image: 16,
        ..SpectralConfig::default()
    };

    // The start set alone would pass
    assert!(check_bin_count(&config, registry.get("small").unwrap().len()).is_ok());
    let failing: Vec<&str> = registry
        .sets()
        .filter(|set| check_bin_count(&config, set.len()).is_err())
        .map(|set| set.name.as_str())
        .collect();
    assert_eq!(failing, vec!["large"]);
}

#[test]
fn test_too_many_seeds_fails_before_start() {
    let registry = SeedRegistry::from_list("0-9").unwrap();
    let buffer = SampleBuffer::with_capacity(64);
    let config = SpectralConfig {
        method: PeriodogramMethod::Welch,
        samples_per_image: 16,
        ..SpectralConfig::default()
    };
    let mut controller = PipelineController::new(
        registry,
        RecordingModel::new(),
        SynthesisConfig::default(),
        move |set| {
            let estimator = SpectralEstimator::new(config.clone(), buffer.clone(), set.len())?;
            Ok(Box::new(estimator) as Box<dyn WeightSource>)
        },
    );

    let err = controller.start("default").unwrap_err();
    assert!(matches!(err, Error::TooManySeeds { requested: 10, .. }));
    assert!(err.to_string().contains("or fewer seeds"));
    assert!(controller.active_set().is_none());
}

#[test]
fn test_silence_is_fatal() {
    let buffer = SampleBuffer::with_capacity(64);
    for _ in 0..8 {
        buffer.push_interleaved([7, 7]);
    }
    let config = SpectralConfig {
        samples_per_image: 8,
        ..SpectralConfig::default()
    };
    let mut controller = PipelineController::new(
        SeedRegistry::from_list("1,2").unwrap(),
        RecordingModel::new(),
        SynthesisConfig::default(),
        move |set| {
            let estimator = SpectralEstimator::new(config.clone(), buffer.clone(), set.len())?;
            Ok(Box::new(estimator) as Box<dyn WeightSource>)
        },
    );
    controller.start("default").unwrap();

    // A constant signal detrends to zero power everywhere
    match controller.next_timeout(TIMEOUT) {
        Some(PipelineEvent::Failed { error, .. }) => {
            assert!(matches!(error, Error::DegenerateLatent(_)))
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_audio_frame_mono_sums_channels() {
    assert_eq!(AudioFrame::new(i32::MAX, i32::MAX).mono(), 2.0 * i32::MAX as f64);
}
