//! Keyboard and mouse input for the viewer core.
//!
//! The platform layer implements [`InputService`] and nothing else; the
//! [`Keyboard`] and [`Mouse`] components poll it once per update and keep the
//! previous snapshot so edge queries work.
//!
//! # Invariants
//! - Devices poll only while the viewer is focused.
//! - An unfocused device reports nothing held and no motion.

mod keyboard;
mod mouse;
mod service;

pub use keyboard::Keyboard;
pub use mouse::Mouse;
pub use service::{InputService, Key, KeyboardState, MouseButton, MouseState, SharedInput};
