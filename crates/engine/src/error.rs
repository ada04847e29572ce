use std::fmt;

use vista_gfx::GraphicsError;
use vista_kernel::{ComponentError, LifecycleError};

/// Lifecycle position of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Constructed,
    Initialized,
    Loaded,
    Running,
    Unloaded,
    /// A lifecycle phase failed; the caller loads again or unloads.
    Faulted,
    /// An unload ran to the end but a step failed. Components have already
    /// been asked to unload; only an explicit `load` or `unload` touches them again.
    UnloadFailed,
}

impl EnginePhase {
    /// Content is loaded and frames may run.
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded | Self::Running)
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Constructed => "constructed",
            Self::Initialized => "initialized",
            Self::Loaded => "loaded",
            Self::Running => "running",
            Self::Unloaded => "unloaded",
            Self::Faulted => "faulted",
            Self::UnloadFailed => "unload-failed",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: ComponentError,
    },
    #[error("cannot {operation} while the engine is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: EnginePhase,
    },
}

impl EngineError {
    /// True when the graphics device itself is unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Graphics(e) => e.is_fatal(),
            Self::Hook {
                source: ComponentError::Graphics(e),
                ..
            } => e.is_fatal(),
            _ => false,
        }
    }
}
