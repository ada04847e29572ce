mod cube;
mod shaders;

use anyhow::{Context, Result};
use clap::Parser;
use glam::{Mat4, Vec2};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vista_common::{Color, Transforms};
use vista_engine::{Engine, EngineSettings, EngineState, ViewerHooks};
use vista_gfx::{GraphicsContext, WgpuBackend};
use vista_input::{InputService, Key, MouseButton, SharedInput};
use vista_kernel::{ComponentError, EngineTime};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use cube::CubeRenderer;

#[derive(Parser)]
#[command(name = "vista-desktop", about = "Vista real-time 3D viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Initial window height
    #[arg(long, default_value = "720")]
    height: u32,

    /// Override the multisample count from the settings
    #[arg(long)]
    samples: Option<u32>,
}

/// Pixels of trackpad travel treated as one wheel notch.
const PIXELS_PER_NOTCH: f64 = 100.0;

/// Radians per second the demo cube turns.
const SPIN_RATE: f32 = 0.6;

/// Window-side half of the viewer: focus, input and the cube pipeline.
struct DesktopHooks {
    focused: Rc<Cell<bool>>,
    input: SharedInput,
    cube: Option<CubeRenderer>,
    spin: f32,
}

impl ViewerHooks<WgpuBackend> for DesktopHooks {
    fn is_active(&self) -> bool {
        self.focused.get()
    }

    fn input_service(&self) -> Rc<dyn InputService> {
        Rc::new(self.input.clone())
    }

    fn load_content(&mut self, state: &mut EngineState<WgpuBackend>) -> Result<(), ComponentError> {
        self.cube = Some(CubeRenderer::new(state.graphics().backend()));
        Ok(())
    }

    fn unload_content(
        &mut self,
        _state: &mut EngineState<WgpuBackend>,
    ) -> Result<(), ComponentError> {
        self.cube = None;
        Ok(())
    }

    fn update(
        &mut self,
        _state: &mut EngineState<WgpuBackend>,
        time: &EngineTime,
    ) -> Result<(), ComponentError> {
        self.spin = (self.spin + SPIN_RATE * time.delta_secs()) % std::f32::consts::TAU;
        Ok(())
    }

    fn draw(
        &mut self,
        state: &EngineState<WgpuBackend>,
        _time: &EngineTime,
        transforms: &Transforms,
        pass: &mut wgpu::RenderPass<'static>,
    ) -> Result<(), ComponentError> {
        if let (Some(renderer), Some(mesh)) = (&self.cube, state.cube()) {
            let spun = Transforms {
                world: transforms.world * Mat4::from_rotation_y(self.spin),
                ..*transforms
            };
            renderer.draw(
                state.graphics().backend().queue(),
                pass,
                mesh,
                &spun,
                Color::rgba(0.9, 0.55, 0.2, 1.0),
            );
        }
        Ok(())
    }
}

struct App {
    settings: EngineSettings,
    initial_size: PhysicalSize<u32>,
    input: SharedInput,
    focused: Rc<Cell<bool>>,
    window: Option<Arc<Window>>,
    engine: Option<Engine<WgpuBackend, DesktopHooks>>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(settings: EngineSettings, width: u32, height: u32) -> Self {
        Self {
            settings,
            initial_size: PhysicalSize::new(width, height),
            input: SharedInput::new(),
            focused: Rc::new(Cell::new(true)),
            window: None,
            engine: None,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Vista")
            .with_inner_size(self.initial_size);
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let size = window.inner_size();
        let graphics = GraphicsContext::<WgpuBackend>::create(
            wgpu::SurfaceTarget::from(Arc::clone(&window)),
            size.width.max(1),
            size.height.max(1),
            &self.settings.graphics,
        )
        .context("failed to create graphics context")?;

        let hooks = DesktopHooks {
            focused: Rc::clone(&self.focused),
            input: self.input.clone(),
            cube: None,
            spin: 0.0,
        };
        let mut engine = Engine::new(graphics, hooks, &self.settings);
        engine.initialize()?;
        engine.load()?;

        window.request_redraw();
        self.window = Some(window);
        self.engine = Some(engine);
        Ok(())
    }

    /// Record a fatal error and leave the event loop; `main` reports it.
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!("{error:#}");
        self.engine = None;
        self.error = Some(error);
        event_loop.exit();
    }

    fn frame(&mut self) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        engine.engine_loop()?;

        let frames = engine.state().frame_count();
        if frames % 600 == 0 {
            let stats = engine.state().stats();
            tracing::debug!(
                frames,
                fps = format_args!("{:.1}", stats.fps()),
                max_ms = stats.max().as_secs_f64() * 1000.0,
                "frame stats"
            );
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                // Dropping the engine unloads content before the device goes away.
                self.engine = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                // Minimized windows report zero; keep the last good targets.
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Some(engine) = self.engine.as_mut() {
                    if let Err(e) = engine.resize(size.width, size.height) {
                        if e.is_fatal() {
                            self.fail(event_loop, e.into());
                        } else {
                            tracing::warn!("resize to {}x{} failed: {e}", size.width, size.height);
                        }
                    }
                }
            }
            WindowEvent::Focused(focused) => {
                self.focused.set(focused);
                if !focused {
                    self.input.release_all();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && state == ElementState::Pressed {
                    self.engine = None;
                    event_loop.exit();
                    return;
                }
                if let Some(key) = map_key(code) {
                    match state {
                        ElementState::Pressed => self.input.key_down(key),
                        ElementState::Released => self.input.key_up(key),
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input
                    .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if let Some(button) = map_button(button) {
                    self.input
                        .button(button, state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / PIXELS_PER_NOTCH) as f32,
                };
                self.input.scroll(notches);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    self.fail(event_loop, e);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,
        KeyCode::Space => Key::Space,
        KeyCode::Enter => Key::Enter,
        KeyCode::Escape => Key::Escape,
        KeyCode::Tab => Key::Tab,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        _ => return None,
    };
    Some(key)
}

fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut settings = match &cli.config {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };
    if let Some(samples) = cli.samples {
        settings.graphics.sample_count = samples;
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(settings, cli.width, cli.height);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
