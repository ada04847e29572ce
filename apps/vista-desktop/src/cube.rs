use bytemuck::{Pod, Zeroable};
use vista_common::{Color, Transforms};
use vista_gfx::{WgpuBackend, WgpuMesh};
use wgpu::util::DeviceExt;

use crate::shaders;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CubeUniforms {
    world_view_proj: [[f32; 4]; 4],
    world: [[f32; 4]; 4],
    color: [f32; 4],
}

/// Pipeline and uniforms for drawing the engine's demo cube.
///
/// Built against the backend's fixed render state so the cube is drawn with
/// the same culling, blending and depth test as everything else.
pub struct CubeRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CubeRenderer {
    pub fn new(backend: &WgpuBackend) -> Self {
        let device = backend.device();

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube_uniforms"),
            contents: bytemuck::bytes_of(&CubeUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("cube_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cube_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cube_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cube_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::CUBE_SHADER.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("cube_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[WgpuMesh::vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(backend.color_target_state())],
            }),
            primitive: backend.primitive_state(),
            depth_stencil: Some(backend.depth_stencil_state()),
            multisample: backend.multisample_state(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    pub fn draw(
        &self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'static>,
        mesh: &WgpuMesh,
        transforms: &Transforms,
        color: Color,
    ) {
        let uniforms = CubeUniforms {
            world_view_proj: transforms.world_view_projection().to_cols_array_2d(),
            world: transforms.world.to_cols_array_2d(),
            color: color.to_array(),
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer().slice(..));
        pass.set_index_buffer(mesh.index_buffer().slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..mesh.index_count(), 0, 0..1);
    }
}
