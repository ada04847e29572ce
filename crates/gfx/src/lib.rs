//! Graphics context for the vista viewer.
//!
//! Owns the device, the presentation surface and the per-size view targets
//! (render target, depth-stencil buffer and their views). Resizing follows a
//! strict order: unbind, release the old targets, resize the back buffers,
//! rebuild. The fixed render state is built once at creation.
//!
//! Two backends implement [`GraphicsBackend`]: [`WgpuBackend`] for real
//! windows and [`HeadlessBackend`], which records every device call.

mod backend;
mod context;
mod error;
pub mod headless;
mod mesh;
pub mod state;
mod wgpu_backend;

pub use backend::{
    ClearValues, ColorFormat, DepthFormat, GpuImage, GraphicsBackend, GraphicsSettings,
    PresentOptions, REFRESH_RATE_HZ, RenderFrame, SurfaceMode,
};
pub use context::{GraphicsContext, ViewTargets};
pub use error::GraphicsError;
pub use headless::{HeadlessBackend, HeadlessTarget};
pub use mesh::{MeshData, Vertex};
pub use state::FixedRenderState;
pub use wgpu_backend::{WgpuBackend, WgpuFrame, WgpuMesh, WgpuTexture, WgpuTextureView};
