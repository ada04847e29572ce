//! Vista engine: the runtime core of the viewer.
//!
//! Owns the graphics context and two component containers (core services
//! and user components), and drives the per-frame cycle: tick the clock,
//! update everything, clear, draw everything, present.
//!
//! # Invariants
//! - Core components run before user components on load, update and draw;
//!   user components go first on unload.
//! - Every hook runs after the engine's own fan-out for that phase.
//! - Frames run only while content is loaded.
//! - Resource factories are emptied exactly once per unload, after the
//!   containers and before the unload hook.

mod camera;
mod engine;
mod error;
mod hooks;
mod settings;
mod state;

pub use camera::ViewerCamera;
pub use engine::Engine;
pub use error::{EngineError, EnginePhase};
pub use hooks::ViewerHooks;
pub use settings::{CameraSettings, EngineSettings, SettingsError};
pub use state::{CoreServices, EngineState};
