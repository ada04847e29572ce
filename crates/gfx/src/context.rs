use vista_common::{Extent, Viewport};

use crate::backend::{
    ClearValues, DepthFormat, GpuImage, GraphicsBackend, GraphicsSettings, PresentOptions,
    SurfaceMode,
};
use crate::error::GraphicsError;
use crate::mesh::MeshData;
use crate::state::FixedRenderState;

/// Render target, depth-stencil buffer and their views, always held together.
///
/// Field order is drop order: each view goes before the image it views.
pub struct ViewTargets<B: GraphicsBackend> {
    render_target_view: B::RenderTargetView,
    render_target: B::RenderTarget,
    depth_stencil_view: B::DepthStencilView,
    depth_stencil: B::DepthStencil,
}

impl<B: GraphicsBackend> ViewTargets<B> {
    pub fn render_target(&self) -> &B::RenderTarget {
        &self.render_target
    }

    pub fn render_target_view(&self) -> &B::RenderTargetView {
        &self.render_target_view
    }

    pub fn depth_stencil(&self) -> &B::DepthStencil {
        &self.depth_stencil
    }

    pub fn depth_stencil_view(&self) -> &B::DepthStencilView {
        &self.depth_stencil_view
    }

    /// Release in protocol order: colour view, colour target, depth view, depth buffer.
    fn dispose(self) {
        let Self {
            render_target_view,
            render_target,
            depth_stencil_view,
            depth_stencil,
        } = self;
        drop(render_target_view);
        drop(render_target);
        drop(depth_stencil_view);
        drop(depth_stencil);
    }
}

/// Owns the graphics device, presentation surface and every viewport-sized resource.
///
/// # Invariants
/// - Render target and depth-stencil buffer are created, resized and destroyed together.
/// - The fixed render state is built once and never changes.
/// - Teardown order is targets, then surface, then device.
pub struct GraphicsContext<B: GraphicsBackend> {
    targets: Option<ViewTargets<B>>,
    render_state: FixedRenderState,
    viewport: Viewport,
    mode: SurfaceMode,
    backend: B,
}

impl<B: GraphicsBackend> GraphicsContext<B> {
    /// Create device and surface for `target`, then the view and the fixed render state.
    ///
    /// Device failures are fatal: there is no fallback adapter and no retry.
    pub fn create(
        target: B::Target,
        width: u32,
        height: u32,
        settings: &GraphicsSettings,
    ) -> Result<Self, GraphicsError> {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            return Err(GraphicsError::InvalidSize { width, height });
        }
        settings.validate()?;

        let mode = SurfaceMode::fixed(extent, settings.sample_count);
        let backend = B::open(target, &mode).inspect_err(|e| {
            tracing::error!("graphics device creation failed: {e}");
        })?;

        let mut context = Self {
            targets: None,
            render_state: FixedRenderState::viewer(mode.sample_count),
            viewport: Viewport::covering(extent),
            mode,
            backend,
        };
        context.create_view(width, height)?;
        context.backend.apply_render_state(&context.render_state);

        tracing::info!(
            %extent,
            samples = mode.sample_count,
            "graphics context created"
        );
        Ok(context)
    }

    /// Resize the back buffers and rebuild the view.
    ///
    /// Zero-sized requests are rejected before anything is touched. When the
    /// buffer resize itself fails the view is rebuilt at the previous size.
    /// When the view rebuild fails it is retried once at the new size, then
    /// the buffers go back to the previous size and the view is rebuilt
    /// there; the rebuild error is still returned in that case.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        let extent = Extent::new(width, height);
        if extent.is_empty() {
            return Err(GraphicsError::InvalidSize { width, height });
        }
        let _span = tracing::debug_span!("resize", %extent).entered();
        let previous = self.mode.extent;

        self.release_view();

        if let Err(err) = self.backend.resize_buffers(extent) {
            tracing::warn!("buffer resize to {extent} failed: {err}; restoring {previous}");
            self.restore_view(previous);
            return Err(err);
        }
        self.mode.extent = extent;

        let Err(err) = self.create_view(width, height) else {
            return Ok(());
        };
        tracing::warn!("view rebuild at {extent} failed: {err}; retrying");
        if self.create_view(width, height).is_ok() {
            return Ok(());
        }

        match self.backend.resize_buffers(previous) {
            Ok(()) => {
                self.mode.extent = previous;
                self.restore_view(previous);
            }
            Err(e) => tracing::error!("could not resize buffers back to {previous}: {e}"),
        }
        Err(err)
    }

    /// Rebuild the view at `extent` after a failed resize. If even that fails
    /// the viewport still tracks the surface so the two never disagree.
    fn restore_view(&mut self, extent: Extent) {
        if let Err(e) = self.create_view(extent.width, extent.height) {
            tracing::error!("could not restore view at {extent}, no targets bound: {e}");
            self.viewport = Viewport::covering(self.mode.extent);
        }
    }

    fn release_view(&mut self) {
        self.backend.unbind_targets();
        if let Some(targets) = self.targets.take() {
            targets.dispose();
        }
    }

    fn create_view(&mut self, width: u32, height: u32) -> Result<(), GraphicsError> {
        let render_target = self.backend.create_render_target()?;
        let render_target_view = self.backend.create_render_target_view(&render_target)?;
        let depth_stencil = self
            .backend
            .create_depth_stencil(render_target.extent(), DepthFormat::Depth24Stencil8)?;
        let depth_stencil_view = self.backend.create_depth_stencil_view(&depth_stencil)?;

        self.backend
            .bind_targets(&render_target_view, &depth_stencil_view);

        let viewport = Viewport::covering(Extent::new(width, height));
        self.backend.set_viewport(viewport);
        self.viewport = viewport;

        self.targets = Some(ViewTargets {
            render_target_view,
            render_target,
            depth_stencil_view,
            depth_stencil,
        });
        tracing::debug!(width, height, "view created");
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn viewport_size(&self) -> Extent {
        self.viewport.extent()
    }

    /// Current targets; `None` only after a failed view rebuild.
    pub fn targets(&self) -> Option<&ViewTargets<B>> {
        self.targets.as_ref()
    }

    pub fn render_state(&self) -> &FixedRenderState {
        &self.render_state
    }

    pub fn surface_mode(&self) -> &SurfaceMode {
        &self.mode
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access. Callers must not create or destroy targets through it.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Acquire the next back buffer and clear colour, depth and stencil.
    pub fn begin_frame(&mut self, clear: &ClearValues) -> Result<B::Frame, GraphicsError> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(GraphicsError::TargetsUnavailable)?;
        self.backend.begin_frame(targets, clear)
    }

    /// Present with no vertical-sync wait and no special flags.
    pub fn present(&mut self, frame: B::Frame) -> Result<(), GraphicsError> {
        self.backend.present(frame, PresentOptions::IMMEDIATE)
    }

    pub fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<B::Mesh, GraphicsError> {
        self.backend
            .upload_mesh(label, &mesh.vertices, &mesh.indices)
    }
}

impl<B: GraphicsBackend> Drop for GraphicsContext<B> {
    fn drop(&mut self) {
        self.release_view();
        tracing::debug!("graphics context released");
    }
}
