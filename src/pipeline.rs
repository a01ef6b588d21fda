//! Cancellable estimation/synthesis task.
//!
//! One worker thread per active seed set pulls weight vectors from a
//! [`WeightSource`], renders one image per vector and hands it to the display
//! over a bounded channel. Switching seed sets shuts the current task down
//! (cancel flag, drop the receiver, join) before the replacement starts, so a
//! new set never sees frames or noise vectors from the old one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::params::SynthesisConfig;
use crate::seeds::{SeedRegistry, SeedSet};
use crate::synthesis::{GenerativeModel, LatentSynthesizer};

/// Produces one weight per seed, blocking until the next vector is ready.
pub trait WeightSource: Send {
    /// `Ok(None)` means `cancel` was observed and the task should stop
    fn next_weights(&mut self, cancel: &AtomicBool) -> Result<Option<Vec<f64>>>;
}

/// A rendered image tagged with the seed set that produced it
#[derive(Debug, Clone)]
pub struct Frame {
    pub seed_set: String,
    /// Position within this task's output, starting at 0
    pub index: u64,
    pub image: RgbImage,
}

#[derive(Debug)]
pub enum PipelineEvent {
    Frame(Frame),
    /// The task hit a fatal error and stopped
    Failed { seed_set: String, error: Error },
}

/// Worker thread for one seed set
pub struct PipelineTask {
    seed_set: String,
    cancel: Arc<AtomicBool>,
    events: Option<Receiver<PipelineEvent>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PipelineTask {
    pub fn spawn(
        seed_set: &SeedSet,
        source: Box<dyn WeightSource>,
        synthesizer: LatentSynthesizer,
    ) -> Self {
        let (sender, receiver) = bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            seed_set: seed_set.name.clone(),
            source,
            synthesizer,
            cancel: Arc::clone(&cancel),
            sender,
        };
        let handle = thread::spawn(move || worker.run());

        Self {
            seed_set: seed_set.name.clone(),
            cancel,
            events: Some(receiver),
            handle: Some(handle),
        }
    }

    pub fn seed_set(&self) -> &str {
        &self.seed_set
    }

    /// Next event if one is ready.
    ///
    /// A worker that exits without reporting (it panicked) shows up as a
    /// `Failed` event rather than as silence.
    pub fn try_next(&self) -> Option<PipelineEvent> {
        match self.events.as_ref()?.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.stopped()),
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<PipelineEvent> {
        match self.events.as_ref()?.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.stopped()),
        }
    }

    fn stopped(&self) -> PipelineEvent {
        error!(seed_set = %self.seed_set, "pipeline thread exited without reporting");
        PipelineEvent::Failed {
            seed_set: self.seed_set.clone(),
            error: Error::WorkerStopped(self.seed_set.clone()),
        }
    }

    /// Cancel and wait for the worker to exit
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Unblocks a worker waiting to hand over a frame
        self.events.take();
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                warn!(seed_set = %self.seed_set, %message, "pipeline thread panicked");
            }
            debug!(seed_set = %self.seed_set, "pipeline stopped");
        }
    }
}

impl Drop for PipelineTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    seed_set: String,
    source: Box<dyn WeightSource>,
    synthesizer: LatentSynthesizer,
    cancel: Arc<AtomicBool>,
    sender: Sender<PipelineEvent>,
}

impl Worker {
    fn run(mut self) {
        let mut index = 0;
        loop {
            let event = match self.step(index) {
                Ok(Some(frame)) => PipelineEvent::Frame(frame),
                Ok(None) => break,
                Err(error) => {
                    let _ = self.sender.send(PipelineEvent::Failed {
                        seed_set: self.seed_set.clone(),
                        error,
                    });
                    break;
                }
            };
            if self.sender.send(event).is_err() {
                break;
            }
            index += 1;
        }
    }

    fn step(&mut self, index: u64) -> Result<Option<Frame>> {
        let Some(weights) = self.source.next_weights(&self.cancel)? else {
            return Ok(None);
        };
        if self.cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let image = self.synthesizer.render(&weights)?;
        Ok(Some(Frame {
            seed_set: self.seed_set.clone(),
            index,
            image,
        }))
    }
}

/// Builds the weight source for a newly selected seed set
pub type SourceFactory = Box<dyn FnMut(&SeedSet) -> Result<Box<dyn WeightSource>>>;

/// Owns the running task and restarts it when the seed set changes
pub struct PipelineController {
    registry: SeedRegistry,
    model: Arc<dyn GenerativeModel>,
    synthesis: SynthesisConfig,
    make_source: SourceFactory,
    task: Option<PipelineTask>,
}

impl PipelineController {
    pub fn new<F>(
        registry: SeedRegistry,
        model: Arc<dyn GenerativeModel>,
        synthesis: SynthesisConfig,
        make_source: F,
    ) -> Self
    where
        F: FnMut(&SeedSet) -> Result<Box<dyn WeightSource>> + 'static,
    {
        Self {
            registry,
            model,
            synthesis,
            make_source: Box::new(make_source),
            task: None,
        }
    }

    pub fn registry(&self) -> &SeedRegistry {
        &self.registry
    }

    pub fn active_set(&self) -> Option<&str> {
        self.task.as_ref().map(PipelineTask::seed_set)
    }

    /// Replace the running task with one for seed set `name`.
    ///
    /// The new source and synthesizer are built first; the old task is only
    /// torn down once they exist.
    pub fn start(&mut self, name: &str) -> Result<()> {
        let set = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownSeedSet(name.to_string()))?;

        let source = (self.make_source)(&set)?;
        let synthesizer = LatentSynthesizer::new(Arc::clone(&self.model), &set.seeds, &self.synthesis)?;

        self.stop();
        info!(seed_set = %set.name, seeds = ?set.seeds, "starting pipeline");
        self.task = Some(PipelineTask::spawn(&set, source, synthesizer));
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.shutdown();
        }
    }

    /// Next event from the current task, if one is ready
    pub fn try_next(&self) -> Option<PipelineEvent> {
        self.task.as_ref()?.try_next()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<PipelineEvent> {
        self.task.as_ref()?.next_timeout(timeout)
    }
}
