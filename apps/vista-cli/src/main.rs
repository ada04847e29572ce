use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vista_assets::ResourceKind;
use vista_common::{Extent, Transforms};
use vista_engine::{Engine, EngineSettings, EngineState, ViewerHooks};
use vista_gfx::headless::{EventLog, GpuEvent, HeadlessPass};
use vista_gfx::{
    FixedRenderState, GraphicsContext, HeadlessBackend, HeadlessTarget, REFRESH_RATE_HZ,
    SurfaceMode,
};
use vista_input::{InputService, Key, SharedInput};
use vista_kernel::{Component, ComponentError, EngineTime, ManualClock};

#[derive(Parser)]
#[command(name = "vista-cli", about = "Headless driver for the vista engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the fixed render state
    Info,
    /// Run the engine loop against the recording backend
    Run {
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Initial surface width
        #[arg(long, default_value = "1280")]
        width: u32,
        /// Initial surface height
        #[arg(long, default_value = "720")]
        height: u32,
        /// Resize to WIDTHxHEIGHT halfway through the run
        #[arg(long, value_parser = parse_extent)]
        resize: Option<Extent>,
        /// Advance a manual clock by this many milliseconds per frame
        /// instead of reading the wall clock
        #[arg(long)]
        fixed_step_ms: Option<u64>,
        /// Hold the forward key for the whole run
        #[arg(long)]
        walk: bool,
        /// JSON settings file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the resource manifest captured before unload to this path
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

fn parse_extent(s: &str) -> Result<Extent, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("width: {e}"))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("height: {e}"))?;
    Ok(Extent::new(width, height))
}

/// Records one draw per frame so the event log shows the fan-out reaching
/// user components.
#[derive(Default)]
struct Marker {
    updates: u64,
}

impl Component<HeadlessBackend> for Marker {
    fn name(&self) -> &'static str {
        "Marker"
    }

    fn update(&mut self, _time: &EngineTime) -> Result<(), ComponentError> {
        self.updates += 1;
        Ok(())
    }

    fn draw(
        &mut self,
        _time: &EngineTime,
        _transforms: &Transforms,
        pass: &mut HeadlessPass,
    ) -> Result<(), ComponentError> {
        pass.record(format!("marker #{}", self.updates));
        Ok(())
    }
}

struct CliHooks {
    input: SharedInput,
}

impl ViewerHooks<HeadlessBackend> for CliHooks {
    fn is_active(&self) -> bool {
        true
    }

    fn input_service(&self) -> Rc<dyn InputService> {
        Rc::new(self.input.clone())
    }

    fn initialize(&mut self, state: &mut EngineState<HeadlessBackend>) -> Result<(), ComponentError> {
        state.components_mut().add(Marker::default());
        Ok(())
    }

    fn load_content(
        &mut self,
        state: &mut EngineState<HeadlessBackend>,
    ) -> Result<(), ComponentError> {
        let services = state
            .services_mut()
            .ok_or_else(|| ComponentError::failed("core services missing"))?;
        let factories = &mut services.factories;
        factories.models.insert("cube", "unit cube");
        factories.textures.insert("checker", [[0u8; 4]; 4]);
        factories.effects.insert("lit", "per-vertex lighting");
        factories.materials.insert("matte", 0.8f32);
        Ok(())
    }

    fn draw(
        &mut self,
        state: &EngineState<HeadlessBackend>,
        _time: &EngineTime,
        _transforms: &Transforms,
        pass: &mut HeadlessPass,
    ) -> Result<(), ComponentError> {
        if state.cube().is_some() {
            pass.record("cube");
        }
        Ok(())
    }
}

fn print_info() {
    let state = FixedRenderState::viewer(4);
    let mode = SurfaceMode::fixed(Extent::new(1280, 720), state.sample_count);
    println!("vista-cli v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "surface: {:?}, {} buffer(s), {} Hz, {}x MSAA",
        mode.format, mode.buffer_count, REFRESH_RATE_HZ, mode.sample_count
    );
    println!(
        "rasterizer: cull {:?}, front face {:?}",
        state.rasterizer.cull, state.rasterizer.front_face
    );
    println!(
        "blend: colour {:?}, alpha {:?}",
        state.blend.color, state.blend.alpha
    );
    println!(
        "depth: {:?}, compare {:?}, write {}, stencil {}",
        state.depth_stencil.format,
        state.depth_stencil.depth_compare,
        state.depth_stencil.depth_write,
        state.depth_stencil.stencil_test
    );
}

struct RunOptions {
    frames: u64,
    width: u32,
    height: u32,
    resize: Option<Extent>,
    fixed_step: Option<Duration>,
    walk: bool,
    config: Option<PathBuf>,
    manifest: Option<PathBuf>,
}

fn run(opts: RunOptions) -> anyhow::Result<()> {
    let settings = match &opts.config {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };

    let log = EventLog::default();
    let graphics = GraphicsContext::<HeadlessBackend>::create(
        HeadlessTarget::new(log.clone()),
        opts.width,
        opts.height,
        &settings.graphics,
    )?;

    let input = SharedInput::new();
    if opts.walk {
        input.key_down(Key::W);
    }
    let hooks = CliHooks {
        input: input.clone(),
    };

    let manual = ManualClock::new();
    let mut engine = match opts.fixed_step {
        Some(_) => Engine::with_time_source(graphics, hooks, &settings, manual.clone()),
        None => Engine::new(graphics, hooks, &settings),
    };

    engine.initialize()?;
    engine.load()?;

    let resize_at = opts.frames / 2;
    for frame in 0..opts.frames {
        if frame == resize_at {
            if let Some(extent) = opts.resize {
                engine.resize(extent.width, extent.height)?;
            }
        }
        if let Some(step) = opts.fixed_step {
            manual.advance(step);
        }
        let time = engine.engine_loop()?;
        tracing::trace!(frame, delta = ?time.delta, "frame");
    }

    let state = engine.state();
    let stats = state.stats();
    println!(
        "frames: {}, average {:.3} ms, max {:.3} ms, {:.1} fps",
        state.frame_count(),
        stats.average().as_secs_f64() * 1000.0,
        stats.max().as_secs_f64() * 1000.0,
        stats.fps()
    );
    let viewport = state.graphics().viewport_size();
    println!("viewport: {}x{}", viewport.width, viewport.height);
    if let Some(services) = state.services() {
        let camera = services.camera.borrow();
        println!(
            "camera: position {:.2}, aspect {:.3}",
            camera.position, camera.aspect
        );
    }

    let manifest = state
        .services()
        .map(|s| s.factories.manifest())
        .unwrap_or_default();
    for kind in [
        ResourceKind::Model,
        ResourceKind::Texture,
        ResourceKind::Effect,
        ResourceKind::Material,
    ] {
        let names = manifest.resources.get(&kind).cloned().unwrap_or_default();
        println!("{kind:?}: {}", names.join(", "));
    }
    if let Some(path) = &opts.manifest {
        manifest
            .save(path)
            .with_context(|| format!("failed to write manifest to {}", path.display()))?;
        println!("manifest written to {}", path.display());
    }

    engine.unload()?;
    drop(engine);

    println!(
        "events: {} frames begun, {} presented, {} resizes, {} created, {} disposed",
        log.count(|e| matches!(e, GpuEvent::FrameBegun { .. })),
        log.count(|e| matches!(e, GpuEvent::Presented { .. })),
        log.count(|e| matches!(e, GpuEvent::BuffersResized(_))),
        log.count(|e| matches!(e, GpuEvent::Created { .. })),
        log.count(|e| matches!(e, GpuEvent::Disposed { .. })),
    );
    tracing::debug!(manifest = %serde_json::to_string(&manifest)?, "resources at unload");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => print_info(),
        Commands::Run {
            frames,
            width,
            height,
            resize,
            fixed_step_ms,
            walk,
            config,
            manifest,
        } => run(RunOptions {
            frames,
            width,
            height,
            resize,
            fixed_step: fixed_step_ms.map(Duration::from_millis),
            walk,
            config,
            manifest,
        })?,
    }

    Ok(())
}
