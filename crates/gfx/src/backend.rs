use serde::Deserialize;
use vista_common::{Color, Extent, Viewport};

use crate::context::ViewTargets;
use crate::error::GraphicsError;
use crate::mesh::Vertex;
use crate::state::FixedRenderState;

/// Refresh rate requested for the presentation surface.
pub const REFRESH_RATE_HZ: u32 = 60;

/// Colour format of the back buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Rgba8Unorm,
    Bgra8Unorm,
}

/// Format of the combined depth + stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFormat {
    Depth24Stencil8,
}

/// Fixed description of the presentation surface handed to [`GraphicsBackend::open`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMode {
    pub extent: Extent,
    pub refresh_rate_hz: u32,
    pub format: ColorFormat,
    pub buffer_count: u32,
    pub sample_count: u32,
}

impl SurfaceMode {
    /// The only mode the viewer runs in: 60 Hz, RGBA8, single back buffer.
    pub fn fixed(extent: Extent, sample_count: u32) -> Self {
        Self {
            extent,
            refresh_rate_hz: REFRESH_RATE_HZ,
            format: ColorFormat::Rgba8Unorm,
            buffer_count: 1,
            sample_count,
        }
    }
}

/// Device-level settings chosen once at context creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphicsSettings {
    /// Multisample count for the render target and depth-stencil buffer.
    pub sample_count: u32,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self { sample_count: 4 }
    }
}

impl GraphicsSettings {
    /// Multisampling is always on, so the count must be a power of two above one.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        let count = self.sample_count;
        if !(2..=16).contains(&count) || !count.is_power_of_two() {
            return Err(GraphicsError::UnsupportedSampleCount { count });
        }
        Ok(())
    }
}

/// Values written by the clear at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: Color,
    pub depth: f32,
    pub stencil: u32,
}

/// How a finished frame is handed to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentOptions {
    /// Vertical blanks to wait for; zero presents immediately.
    pub sync_interval: u32,
}

impl PresentOptions {
    pub const IMMEDIATE: Self = Self { sync_interval: 0 };
}

/// A GPU image with a known size.
pub trait GpuImage {
    fn extent(&self) -> Extent;
}

/// A frame in flight: owns the recording pass until it is presented.
pub trait RenderFrame {
    type Pass;

    fn pass(&mut self) -> &mut Self::Pass;
}

/// Narrow contract between [`GraphicsContext`](crate::GraphicsContext) and a rendering backend.
///
/// The context owns ordering: it decides when targets are unbound, disposed
/// and rebuilt. A backend only performs the individual steps. Every resource
/// handle it returns releases its GPU memory on drop.
pub trait GraphicsBackend: Sized + 'static {
    /// Whatever the platform hands over to bind a surface (window handle).
    type Target;
    type RenderTarget: GpuImage;
    type RenderTargetView;
    type DepthStencil: GpuImage;
    type DepthStencilView;
    type Mesh;
    type Pass;
    type Frame: RenderFrame<Pass = Self::Pass>;

    /// Create device and presentation surface. Failure is fatal.
    fn open(target: Self::Target, mode: &SurfaceMode) -> Result<Self, GraphicsError>;

    fn surface_extent(&self) -> Extent;

    fn apply_render_state(&mut self, state: &FixedRenderState);

    /// Detach every render-target and depth-stencil binding.
    fn unbind_targets(&mut self);

    /// Resize the back buffers in place. Must only be called with no targets alive.
    fn resize_buffers(&mut self, extent: Extent) -> Result<(), GraphicsError>;

    /// Colour target derived from the current back buffers.
    fn create_render_target(&mut self) -> Result<Self::RenderTarget, GraphicsError>;

    fn create_render_target_view(
        &mut self,
        target: &Self::RenderTarget,
    ) -> Result<Self::RenderTargetView, GraphicsError>;

    /// Depth-stencil buffer matching the surface's multisample setting.
    fn create_depth_stencil(
        &mut self,
        extent: Extent,
        format: DepthFormat,
    ) -> Result<Self::DepthStencil, GraphicsError>;

    fn create_depth_stencil_view(
        &mut self,
        buffer: &Self::DepthStencil,
    ) -> Result<Self::DepthStencilView, GraphicsError>;

    fn bind_targets(&mut self, color: &Self::RenderTargetView, depth: &Self::DepthStencilView);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Acquire the next back buffer and clear the bound targets.
    fn begin_frame(
        &mut self,
        targets: &ViewTargets<Self>,
        clear: &ClearValues,
    ) -> Result<Self::Frame, GraphicsError>;

    fn present(&mut self, frame: Self::Frame, options: PresentOptions) -> Result<(), GraphicsError>;

    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u16],
    ) -> Result<Self::Mesh, GraphicsError>;
}
