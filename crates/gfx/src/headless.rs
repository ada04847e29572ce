//! Recording backend with no GPU behind it.
//!
//! Every device call is appended to a shared [`EventLog`], and every resource
//! handle logs its own disposal when dropped. Used by tests to check resource
//! ordering and by the CLI to drive the frame loop without a window.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vista_common::{Extent, Viewport};

use crate::backend::{
    ClearValues, DepthFormat, GpuImage, GraphicsBackend, PresentOptions, RenderFrame, SurfaceMode,
};
use crate::context::ViewTargets;
use crate::error::GraphicsError;
use crate::mesh::Vertex;
use crate::state::FixedRenderState;

/// Largest texture dimension the headless device accepts.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    RenderTarget,
    RenderTargetView,
    DepthStencil,
    DepthStencilView,
    Mesh,
}

/// One recorded device interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuEvent {
    DeviceOpened { mode: SurfaceMode },
    RenderStateApplied,
    TargetsUnbound,
    TargetsBound { color: u64, depth: u64 },
    ViewportSet(Viewport),
    BuffersResized(Extent),
    Created { kind: ResourceKind, id: u64, extent: Extent },
    Disposed { kind: ResourceKind, id: u64 },
    FrameBegun { clear: ClearValues },
    Draw(String),
    Presented { sync_interval: u32 },
    SurfaceReleased,
    DeviceReleased,
}

/// Shared, append-only record of device events.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<GpuEvent>>>);

impl EventLog {
    pub fn push(&self, event: GpuEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GpuEvent) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| predicate(e)).count()
    }
}

/// Stand-in for a native window handle.
#[derive(Debug, Clone, Default)]
pub struct HeadlessTarget {
    log: EventLog,
    fail_open: bool,
}

impl HeadlessTarget {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_open: false,
        }
    }

    /// Make device creation fail, as on a machine without a usable adapter.
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

/// A GPU resource that exists only as an id in the log.
#[derive(Debug)]
pub struct HeadlessResource {
    kind: ResourceKind,
    id: u64,
    extent: Extent,
    log: EventLog,
    live: Rc<Cell<usize>>,
}

impl HeadlessResource {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl GpuImage for HeadlessResource {
    fn extent(&self) -> Extent {
        self.extent
    }
}

impl Drop for HeadlessResource {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
        self.log.push(GpuEvent::Disposed {
            kind: self.kind,
            id: self.id,
        });
    }
}

/// Draw recorder handed to components during a headless frame.
#[derive(Debug)]
pub struct HeadlessPass {
    log: EventLog,
}

impl HeadlessPass {
    pub fn record(&mut self, label: impl Into<String>) {
        self.log.push(GpuEvent::Draw(label.into()));
    }
}

#[derive(Debug)]
pub struct HeadlessFrame {
    pass: HeadlessPass,
}

impl RenderFrame for HeadlessFrame {
    type Pass = HeadlessPass;

    fn pass(&mut self) -> &mut HeadlessPass {
        &mut self.pass
    }
}

#[derive(Debug)]
pub struct HeadlessBackend {
    log: EventLog,
    extent: Extent,
    sample_count: u32,
    next_id: u64,
    live: Rc<Cell<usize>>,
    bound: Option<(u64, u64)>,
    viewport: Option<Viewport>,
    frames_presented: u64,
    fail_next_resize: bool,
    failing_targets: u32,
}

impl HeadlessBackend {
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Resources created and not yet dropped.
    pub fn live_resources(&self) -> usize {
        self.live.get()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Ids of the currently bound colour and depth views.
    pub fn bound_targets(&self) -> Option<(u64, u64)> {
        self.bound
    }

    pub fn fail_next_resize(&mut self) {
        self.fail_next_resize = true;
    }

    /// Make the next render target creation fail. Calls stack: calling this
    /// twice fails the next two creations.
    pub fn fail_next_target(&mut self) {
        self.failing_targets += 1;
    }

    /// Viewport last set on the device, if any.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    fn allocate(&mut self, kind: ResourceKind, extent: Extent) -> HeadlessResource {
        self.next_id += 1;
        self.live.set(self.live.get() + 1);
        self.log.push(GpuEvent::Created {
            kind,
            id: self.next_id,
            extent,
        });
        HeadlessResource {
            kind,
            id: self.next_id,
            extent,
            log: self.log.clone(),
            live: Rc::clone(&self.live),
        }
    }
}

impl GraphicsBackend for HeadlessBackend {
    type Target = HeadlessTarget;
    type RenderTarget = HeadlessResource;
    type RenderTargetView = HeadlessResource;
    type DepthStencil = HeadlessResource;
    type DepthStencilView = HeadlessResource;
    type Mesh = HeadlessResource;
    type Pass = HeadlessPass;
    type Frame = HeadlessFrame;

    fn open(target: HeadlessTarget, mode: &SurfaceMode) -> Result<Self, GraphicsError> {
        if target.fail_open {
            return Err(GraphicsError::DeviceCreation(
                "headless device unavailable".into(),
            ));
        }
        target.log.push(GpuEvent::DeviceOpened { mode: *mode });
        Ok(Self {
            log: target.log,
            extent: mode.extent,
            sample_count: mode.sample_count,
            next_id: 0,
            live: Rc::new(Cell::new(0)),
            bound: None,
            viewport: None,
            frames_presented: 0,
            fail_next_resize: false,
            failing_targets: 0,
        })
    }

    fn surface_extent(&self) -> Extent {
        self.extent
    }

    fn apply_render_state(&mut self, state: &FixedRenderState) {
        debug_assert_eq!(state.sample_count, self.sample_count);
        self.log.push(GpuEvent::RenderStateApplied);
    }

    fn unbind_targets(&mut self) {
        self.bound = None;
        self.log.push(GpuEvent::TargetsUnbound);
    }

    fn resize_buffers(&mut self, extent: Extent) -> Result<(), GraphicsError> {
        if self.bound.is_some() {
            return Err(GraphicsError::Surface(
                "buffers resized while targets are bound".into(),
            ));
        }
        if std::mem::take(&mut self.fail_next_resize) {
            return Err(GraphicsError::Surface("injected resize failure".into()));
        }
        if extent.width > MAX_DIMENSION || extent.height > MAX_DIMENSION {
            return Err(GraphicsError::InvalidSize {
                width: extent.width,
                height: extent.height,
            });
        }
        self.extent = extent;
        self.log.push(GpuEvent::BuffersResized(extent));
        Ok(())
    }

    fn create_render_target(&mut self) -> Result<HeadlessResource, GraphicsError> {
        if self.failing_targets > 0 {
            self.failing_targets -= 1;
            return Err(GraphicsError::ResourceCreation(
                "injected render target failure".into(),
            ));
        }
        Ok(self.allocate(ResourceKind::RenderTarget, self.extent))
    }

    fn create_render_target_view(
        &mut self,
        target: &HeadlessResource,
    ) -> Result<HeadlessResource, GraphicsError> {
        Ok(self.allocate(ResourceKind::RenderTargetView, target.extent))
    }

    fn create_depth_stencil(
        &mut self,
        extent: Extent,
        _format: DepthFormat,
    ) -> Result<HeadlessResource, GraphicsError> {
        Ok(self.allocate(ResourceKind::DepthStencil, extent))
    }

    fn create_depth_stencil_view(
        &mut self,
        buffer: &HeadlessResource,
    ) -> Result<HeadlessResource, GraphicsError> {
        Ok(self.allocate(ResourceKind::DepthStencilView, buffer.extent))
    }

    fn bind_targets(&mut self, color: &HeadlessResource, depth: &HeadlessResource) {
        self.bound = Some((color.id, depth.id));
        self.log.push(GpuEvent::TargetsBound {
            color: color.id,
            depth: depth.id,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.log.push(GpuEvent::ViewportSet(viewport));
    }

    fn begin_frame(
        &mut self,
        targets: &ViewTargets<Self>,
        clear: &ClearValues,
    ) -> Result<HeadlessFrame, GraphicsError> {
        let expected = (targets.render_target_view().id, targets.depth_stencil_view().id);
        if self.bound != Some(expected) {
            return Err(GraphicsError::TargetsUnavailable);
        }
        self.log.push(GpuEvent::FrameBegun { clear: *clear });
        Ok(HeadlessFrame {
            pass: HeadlessPass {
                log: self.log.clone(),
            },
        })
    }

    fn present(&mut self, frame: HeadlessFrame, options: PresentOptions) -> Result<(), GraphicsError> {
        drop(frame);
        self.frames_presented += 1;
        self.log.push(GpuEvent::Presented {
            sync_interval: options.sync_interval,
        });
        Ok(())
    }

    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u16],
    ) -> Result<HeadlessResource, GraphicsError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(GraphicsError::ResourceCreation(format!(
                "mesh '{label}' has no geometry"
            )));
        }
        Ok(self.allocate(
            ResourceKind::Mesh,
            Extent::new(vertices.len() as u32, indices.len() as u32),
        ))
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        self.log.push(GpuEvent::SurfaceReleased);
        self.log.push(GpuEvent::DeviceReleased);
    }
}
