//! Shared value types for the vista viewer core.
//!
//! Everything here is plain `Copy` data with no GPU or platform coupling, so
//! every other crate in the workspace can depend on it.

mod types;

pub use types::{Color, Extent, Transforms, Viewport};
