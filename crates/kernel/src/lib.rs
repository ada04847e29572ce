//! Viewer kernel: frame timing and component composition.
//!
//! # Invariants
//! - A container invokes its members in registration order for every phase.
//! - Every member of one fan-out sees the same [`EngineTime`].
//! - Total elapsed time is the exact sum of the per-frame deltas.

mod component;
mod container;
mod time;

pub use component::{Component, ComponentError};
pub use container::{ComponentContainer, LifecycleError, LifecyclePhase};
pub use time::{EngineTime, FrameClock, FrameStats, ManualClock, MonotonicClock, TimeSource};
