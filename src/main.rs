//! Spectral Visualiser - live audio-reactive generative images
//!
//! The spectrum of the incoming audio mixes a handful of seeded latent
//! vectors; a generator network turns each mix into the next frame.
//! Type the name of another seed set and press Enter to switch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::fmt::time::UtcTime;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use spectral_visualiser::audio::{AudioSystem, SampleBuffer};
use spectral_visualiser::cli::{Args, LogFormat};
use spectral_visualiser::display::{window_title, DisplayState, InputOutcome, InputState, KeyInput};
use spectral_visualiser::params::{RecordingConfig, RenderConfig};
use spectral_visualiser::pipeline::{Frame, PipelineController, PipelineEvent, WeightSource};
use spectral_visualiser::rendering::RenderSystem;
use spectral_visualiser::seeds::{SeedRegistry, SeedSet};
use spectral_visualiser::spectrum::{check_bin_count, SpectralEstimator};
use spectral_visualiser::synthesis::{GenerativeModel, Network};
use spectral_visualiser::Error;

/// How often the event loop checks for a finished frame
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    // Pipeline and keyboard switching
    controller: PipelineController,
    input: InputState,
    state: DisplayState,

    // Configuration
    render_config: RenderConfig,
    recording_config: Option<RecordingConfig>,

    frames_shown: u64,
    fatal: Option<Error>,

    /// Audio input stream (kept alive)
    _audio: AudioSystem,
}

impl App {
    fn new(
        controller: PipelineController,
        render_config: RenderConfig,
        recording_config: Option<RecordingConfig>,
        audio: AudioSystem,
    ) -> Self {
        Self {
            window: None,
            render_system: None,
            controller,
            input: InputState::new(),
            state: DisplayState::Running,
            render_config,
            recording_config,
            frames_shown: 0,
            fatal: None,
            _audio: audio,
        }
    }

    /// Stop the event loop and remember why
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        error!("{}", err);
        self.controller.stop();
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn refresh_title(&self) {
        if let Some(window) = &self.window {
            window.set_title(&window_title(
                &self.render_config.title,
                self.controller.active_set(),
                self.input.typed(),
            ));
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let key = match &event.logical_key {
            Key::Named(NamedKey::Escape) => {
                event_loop.exit();
                return;
            }
            Key::Named(NamedKey::Enter) => KeyInput::Enter,
            Key::Named(NamedKey::Backspace) => KeyInput::Backspace,
            _ => match &event.text {
                Some(text) => KeyInput::Text(text.to_string()),
                None => return,
            },
        };

        match self.input.handle(key, self.controller.registry()) {
            InputOutcome::Pending => {}
            InputOutcome::Switch(name) => {
                info!("Switching to seed set '{}'", name);
                self.state = DisplayState::Switching(name);
            }
            InputOutcome::Unknown(name) => {
                let known: Vec<&str> = self.controller.registry().names().collect();
                error!(
                    "Unknown seed set '{}' (available: {})",
                    name,
                    known.join(", ")
                );
            }
        }
        self.refresh_title();
    }

    /// Upload a finished frame and schedule a repaint
    fn show_frame(&mut self, frame: Frame) {
        let Some(ref mut render_system) = self.render_system else {
            return;
        };
        render_system.update_image(&frame.image);

        if let Some(ref config) = self.recording_config {
            let path = config.frame_path(self.frames_shown);
            if let Err(e) = frame.image.save(&path) {
                warn!("Failed to save frame {}: {}", path.display(), e);
            }
        }

        self.frames_shown += 1;
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Render the current frame
    fn render_frame(&mut self) {
        let Some(ref mut render_system) = self.render_system else {
            return;
        };
        match render_system.render() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    render_system.resize(size.width, size.height);
                }
            }
            Err(e) => warn!("Render error: {:?}", e),
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let DisplayState::Switching(name) = &self.state {
            let name = name.clone();
            self.state = DisplayState::Running;
            if let Err(e) = self.controller.start(&name) {
                self.fail(event_loop, e);
                return;
            }
            self.refresh_title();
        }

        match self.controller.try_next() {
            Some(PipelineEvent::Frame(frame)) => self.show_frame(frame),
            Some(PipelineEvent::Failed { seed_set, error }) => {
                error!("Pipeline for seed set '{}' failed", seed_set);
                self.fail(event_loop, error);
                return;
            }
            None => {}
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(
            Instant::now() + FRAME_POLL_INTERVAL,
        ));
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        // Create window
        let window_attributes = Window::default_attributes()
            .with_title(&self.render_config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, Error::Render(format!("failed to create window: {}", e)));
                return;
            }
        };

        // Initialize rendering system
        match pollster::block_on(RenderSystem::new(Arc::clone(&window))) {
            Ok(render_system) => self.render_system = Some(render_system),
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        }

        info!("Spectral Visualiser is running! Type a seed set name and press Enter to switch, ESC to quit");

        self.window = Some(window);
        self.refresh_title();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(ref mut render_system) = self.render_system {
                    render_system.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                self.handle_key(event_loop, &event);
            }
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            _ => {}
        }
    }
}

fn init_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);
    match args.log_format {
        LogFormat::Json => builder.json().with_timer(UtcTime::rfc_3339()).init(),
        LogFormat::Text => builder.init(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    info!("Spectral Visualiser - audio-reactive generative images");

    let registry =
        SeedRegistry::from_sources(args.seeds_list.as_deref(), args.seeds_file.as_deref())
            .context("failed to load seed sets")?;

    let spectral = args.spectral_config();
    spectral.validate()?;
    let buffer_config = args.buffer_config();
    buffer_config.validate(&spectral)?;
    let synthesis = args.synthesis_config();

    // Every set must fit the spectrum, not just the one shown first
    for set in registry.sets() {
        check_bin_count(&spectral, set.len())
            .with_context(|| format!("seed set '{}' cannot be used", set.name))?;
    }

    let network = Network::load(&args.network)
        .with_context(|| format!("failed to load network {}", args.network.display()))?;
    info!(
        "Network: {}x{} images, {}-dim latents",
        network.resolution(),
        network.resolution(),
        network.latent_dim()
    );
    let model: Arc<dyn GenerativeModel> = Arc::new(network);

    let recording_config = args.recording_config();
    if let Some(ref config) = recording_config {
        std::fs::create_dir_all(config.frames_dir()).with_context(|| {
            format!("failed to create {}", config.frames_dir().display())
        })?;
    }

    let buffer = SampleBuffer::with_capacity(buffer_config.capacity_frames);
    debug!(frames = buffer.capacity(), "sample buffer allocated");
    let audio = AudioSystem::new(
        args.audio_host.as_deref(),
        &args.source,
        spectral.sample_rate_hz,
        buffer.clone(),
    )
    .with_context(|| format!("failed to open audio source '{}'", args.source))?;
    info!(
        "Audio: {} @ {}Hz ({:?}), ~{:.1} images/s",
        audio.device_name(),
        spectral.sample_rate_hz,
        audio.sample_format(),
        spectral.images_per_second()
    );

    let mut controller = PipelineController::new(registry, model, synthesis, move |set: &SeedSet| {
        let estimator = SpectralEstimator::new(spectral.clone(), buffer.clone(), set.len())?;
        Ok(Box::new(estimator) as Box<dyn WeightSource>)
    });
    let start = controller.registry().start_name().to_string();
    controller
        .start(&start)
        .with_context(|| format!("failed to start seed set '{}'", start))?;

    let mut app = App::new(
        controller,
        RenderConfig::default(),
        recording_config,
        audio,
    );
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
