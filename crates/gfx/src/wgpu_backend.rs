//! wgpu implementation of [`GraphicsBackend`].
//!
//! The render target is a multisampled colour texture sized to the surface;
//! each frame it is resolved into the acquired swap-chain image. wgpu has no
//! device-global bindings, so "bound" targets are simply the ones the next
//! frame's render pass attaches.

use vista_common::{Extent, Viewport};
use wgpu::util::DeviceExt;

use crate::backend::{
    ClearValues, ColorFormat, DepthFormat, GpuImage, GraphicsBackend, PresentOptions, RenderFrame,
    SurfaceMode,
};
use crate::context::ViewTargets;
use crate::error::GraphicsError;
use crate::mesh::Vertex;
use crate::state::{
    BlendComponent, BlendFactor, BlendOp, CompareFunction, CullMode, FillMode, FixedRenderState,
    FrontFace,
};

pub struct WgpuTexture {
    texture: wgpu::Texture,
    extent: Extent,
}

impl WgpuTexture {
    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl GpuImage for WgpuTexture {
    fn extent(&self) -> Extent {
        self.extent
    }
}

impl Drop for WgpuTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

pub struct WgpuTextureView {
    view: wgpu::TextureView,
}

impl WgpuTextureView {
    pub fn raw(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Vertex and index buffers for one uploaded mesh.
pub struct WgpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl WgpuMesh {
    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Vertex layout matching [`Vertex`]: position at location 0, normal at 1.
    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

impl Drop for WgpuMesh {
    fn drop(&mut self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// Frame in flight: the open main pass, its encoder and the acquired back buffer.
pub struct WgpuFrame {
    pass: wgpu::RenderPass<'static>,
    encoder: wgpu::CommandEncoder,
    surface_texture: wgpu::SurfaceTexture,
}

impl RenderFrame for WgpuFrame {
    type Pass = wgpu::RenderPass<'static>;

    fn pass(&mut self) -> &mut wgpu::RenderPass<'static> {
        &mut self.pass
    }
}

/// Field order is drop order: the surface goes before the device.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    queue: wgpu::Queue,
    device: wgpu::Device,
    adapter_info: wgpu::AdapterInfo,
    render_state: FixedRenderState,
    viewport: Viewport,
    bound: bool,
}

impl WgpuBackend {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        let r = &self.render_state.rasterizer;
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: match r.front_face {
                FrontFace::Clockwise => wgpu::FrontFace::Cw,
                FrontFace::CounterClockwise => wgpu::FrontFace::Ccw,
            },
            cull_mode: match r.cull {
                CullMode::None => None,
                CullMode::Front => Some(wgpu::Face::Front),
                CullMode::Back => Some(wgpu::Face::Back),
            },
            polygon_mode: match r.fill {
                FillMode::Solid => wgpu::PolygonMode::Fill,
                FillMode::Wireframe => wgpu::PolygonMode::Line,
            },
            ..Default::default()
        }
    }

    pub fn color_target_state(&self) -> wgpu::ColorTargetState {
        let b = &self.render_state.blend;
        wgpu::ColorTargetState {
            format: self.config.format,
            blend: b.enabled.then(|| wgpu::BlendState {
                color: blend_component(b.color),
                alpha: blend_component(b.alpha),
            }),
            write_mask: if b.write_all_channels {
                wgpu::ColorWrites::ALL
            } else {
                wgpu::ColorWrites::COLOR
            },
        }
    }

    pub fn depth_stencil_state(&self) -> wgpu::DepthStencilState {
        let d = &self.render_state.depth_stencil;
        wgpu::DepthStencilState {
            format: depth_format(d.format),
            depth_write_enabled: d.depth_write,
            depth_compare: if d.depth_test {
                match d.depth_compare {
                    CompareFunction::Never => wgpu::CompareFunction::Never,
                    CompareFunction::Less => wgpu::CompareFunction::Less,
                    CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
                    CompareFunction::Always => wgpu::CompareFunction::Always,
                }
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: Default::default(),
            bias: Default::default(),
        }
    }

    pub fn multisample_state(&self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: if self.render_state.rasterizer.multisample {
                self.render_state.sample_count
            } else {
                1
            },
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }

    fn create_texture(
        &self,
        label: &str,
        extent: Extent,
        format: wgpu::TextureFormat,
    ) -> WgpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: self.render_state.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        WgpuTexture { texture, extent }
    }
}

fn blend_component(c: BlendComponent) -> wgpu::BlendComponent {
    let factor = |f: BlendFactor| match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    };
    wgpu::BlendComponent {
        src_factor: factor(c.src),
        dst_factor: factor(c.dst),
        operation: match c.op {
            BlendOp::Add => wgpu::BlendOperation::Add,
            BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        },
    }
}

fn depth_format(format: DepthFormat) -> wgpu::TextureFormat {
    match format {
        DepthFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

fn preferred_format(
    available: &[wgpu::TextureFormat],
    wanted: ColorFormat,
) -> Option<wgpu::TextureFormat> {
    let wanted = match wanted {
        ColorFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ColorFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
    };
    [wanted, wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureFormat::Bgra8Unorm]
        .into_iter()
        .find(|f| available.contains(f))
        .or_else(|| available.first().copied())
}

impl GraphicsBackend for WgpuBackend {
    type Target = wgpu::SurfaceTarget<'static>;
    type RenderTarget = WgpuTexture;
    type RenderTargetView = WgpuTextureView;
    type DepthStencil = WgpuTexture;
    type DepthStencilView = WgpuTextureView;
    type Mesh = WgpuMesh;
    type Pass = wgpu::RenderPass<'static>;
    type Frame = WgpuFrame;

    fn open(target: Self::Target, mode: &SurfaceMode) -> Result<Self, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| GraphicsError::DeviceCreation(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(GraphicsError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        if adapter_info.device_type == wgpu::DeviceType::Cpu {
            return Err(GraphicsError::NoAdapter);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("vista_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| GraphicsError::DeviceCreation(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = preferred_format(&caps.formats, mode.format).ok_or_else(|| {
            GraphicsError::DeviceCreation("surface reports no supported formats".into())
        })?;

        for f in [format, depth_format(DepthFormat::Depth24Stencil8)] {
            let features = adapter.get_texture_format_features(f);
            if !features.flags.sample_count_supported(mode.sample_count) {
                return Err(GraphicsError::UnsupportedSampleCount {
                    count: mode.sample_count,
                });
            }
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: mode.extent.width,
            height: mode.extent.height,
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: mode.buffer_count.max(1),
        };
        surface.configure(&device, &config);

        tracing::info!(
            "GPU initialized with {} backend on {} ({:?}), refresh {} Hz requested",
            adapter_info.backend.to_str(),
            adapter_info.name,
            format,
            mode.refresh_rate_hz
        );

        Ok(Self {
            surface,
            config,
            queue,
            device,
            adapter_info,
            render_state: FixedRenderState::viewer(mode.sample_count),
            viewport: Viewport::covering(mode.extent),
            bound: false,
        })
    }

    fn surface_extent(&self) -> Extent {
        Extent::new(self.config.width, self.config.height)
    }

    fn apply_render_state(&mut self, state: &FixedRenderState) {
        self.render_state = *state;
    }

    fn unbind_targets(&mut self) {
        self.bound = false;
    }

    fn resize_buffers(&mut self, extent: Extent) -> Result<(), GraphicsError> {
        if self.bound {
            return Err(GraphicsError::Surface(
                "buffers resized while targets are bound".into(),
            ));
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if extent.width > max || extent.height > max {
            return Err(GraphicsError::InvalidSize {
                width: extent.width,
                height: extent.height,
            });
        }
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);
        Ok(())
    }

    fn create_render_target(&mut self) -> Result<WgpuTexture, GraphicsError> {
        Ok(self.create_texture(
            "render_target",
            self.surface_extent(),
            self.config.format,
        ))
    }

    fn create_render_target_view(
        &mut self,
        target: &WgpuTexture,
    ) -> Result<WgpuTextureView, GraphicsError> {
        Ok(WgpuTextureView {
            view: target
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        })
    }

    fn create_depth_stencil(
        &mut self,
        extent: Extent,
        format: DepthFormat,
    ) -> Result<WgpuTexture, GraphicsError> {
        Ok(self.create_texture("depth_stencil", extent, depth_format(format)))
    }

    fn create_depth_stencil_view(
        &mut self,
        buffer: &WgpuTexture,
    ) -> Result<WgpuTextureView, GraphicsError> {
        Ok(WgpuTextureView {
            view: buffer
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        })
    }

    fn bind_targets(&mut self, _color: &WgpuTextureView, _depth: &WgpuTextureView) {
        self.bound = true;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn begin_frame(
        &mut self,
        targets: &ViewTargets<Self>,
        clear: &ClearValues,
    ) -> Result<WgpuFrame, GraphicsError> {
        if !self.bound {
            return Err(GraphicsError::TargetsUnavailable);
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(GraphicsError::SurfaceLost);
            }
            Err(e) => return Err(GraphicsError::Surface(e.to_string())),
        };
        let resolve_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        let c = clear.color;
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: targets.render_target_view().raw(),
                    resolve_target: Some(&resolve_view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: c.r as f64,
                            g: c.g as f64,
                            b: c.b as f64,
                            a: c.a as f64,
                        }),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: targets.depth_stencil_view().raw(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.stencil),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                ..Default::default()
            })
            .forget_lifetime();

        let vp = self.viewport;
        pass.set_viewport(vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth);

        Ok(WgpuFrame {
            pass,
            encoder,
            surface_texture,
        })
    }

    fn present(&mut self, frame: WgpuFrame, options: PresentOptions) -> Result<(), GraphicsError> {
        let WgpuFrame {
            pass,
            encoder,
            surface_texture,
        } = frame;
        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(sync_interval = options.sync_interval, "present");
        surface_texture.present();
        Ok(())
    }

    fn upload_mesh(
        &mut self,
        label: &str,
        vertices: &[Vertex],
        indices: &[u16],
    ) -> Result<WgpuMesh, GraphicsError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(GraphicsError::ResourceCreation(format!(
                "mesh '{label}' has no geometry"
            )));
        }
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        // Index data must be padded to a 4-byte multiple.
        let mut index_data: Vec<u16> = indices.to_vec();
        if index_data.len() % 2 != 0 {
            index_data.push(0);
        }
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&index_data),
                usage: wgpu::BufferUsages::INDEX,
            });
        Ok(WgpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }
}
