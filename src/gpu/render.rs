//! Point-sprite renderer for the position texture.
//!
//! Each point is an instanced quad. Its only per-instance input is the reference
//! UV of its cell, which the vertex shader turns back into a texel coordinate to
//! fetch `(x, y, z, speed)`. Size and color are driven by `speed`.

use glam::{Vec3, Vec4};

use crate::buffers::Slot;
use crate::config::RenderConfig;
use crate::gpu::state::GpuSimulation;
use crate::shader::{render_shader_wgsl, RenderUniforms};
use wgpu::util::DeviceExt;

/// Screen-space point diameter in physical pixels.
///
/// Mirrors the vertex shader.
pub fn point_size_px(point_size: f32, speed: f32, depth: f32, pixel_ratio: f32) -> f32 {
    point_size * (1.0 + 2.0 * speed) * (100.0 / depth.max(1e-3)) * pixel_ratio
}

/// Point color and alpha for a given speed. Mirrors the vertex shader.
pub fn point_color(render: &RenderConfig, speed: f32) -> Vec4 {
    let t = speed.clamp(0.0, 1.0);
    let base = Vec3::from_array(render.base_color);
    let active = Vec3::from_array(render.active_color);
    base.lerp(active, t).extend(0.6 + 0.4 * t)
}

/// Draws one sprite per grid cell from the position texture.
pub struct PointRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    reference_buffer: wgpu::Buffer,
    /// Indexed by the slot being read.
    bind_groups: [wgpu::BindGroup; 2],
    instance_count: u32,
}

impl PointRenderer {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sim: &GpuSimulation,
    ) -> Self {
        let grid = sim.grid();

        let reference_uvs = grid.reference_uvs();
        let reference_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Reference UVs"),
            contents: bytemuck::cast_slice(&reference_uvs),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Render Uniforms"),
            size: std::mem::size_of::<RenderUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Point Render Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let bind_groups = [Slot::A, Slot::B].map(|slot| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Point Render Bind Group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(sim.position_view(slot)),
                    },
                ],
            })
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Point Render Shader"),
            source: wgpu::ShaderSource::Wgsl(render_shader_wgsl().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Render Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        // Additive: overlapping sprites brighten, draw order does not matter.
        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Point Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &[wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x2, // reference uv
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            reference_buffer,
            bind_groups,
            instance_count: grid.cell_count(),
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, uniforms: &RenderUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Draw every point, reading positions from `slot`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, slot: Slot) {
        let index = match slot {
            Slot::A => 0,
            Slot::B => 1,
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[index], &[]);
        pass.set_vertex_buffer(0, self.reference_buffer.slice(..));
        pass.draw(0..6, 0..self.instance_count);
    }
}
