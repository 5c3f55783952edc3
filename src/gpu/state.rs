//! GPU state textures and the two compute kernels.

use glam::Vec4;

use crate::buffers::{PingPong, Slot, StateBuffers};
use crate::cpu::initial_state;
use crate::error::GpuError;
use crate::grid::GridSize;
use crate::shader::{position_kernel_wgsl, velocity_kernel_wgsl, SimUniforms, WORKGROUP_SIZE};

pub(crate) const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_BYTES: u32 = 16;

/// One RGBA32F texture holding a `(x, y, z, w)` record per cell.
pub struct StateTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl StateTexture {
    fn new(device: &wgpu::Device, grid: GridSize, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(grid),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    fn upload(&self, queue: &wgpu::Queue, grid: GridSize, data: &[Vec4]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(grid.width * TEXEL_BYTES),
                rows_per_image: Some(grid.height),
            },
            extent(grid),
        );
    }
}

fn extent(grid: GridSize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: grid.width,
        height: grid.height,
        depth_or_array_layers: 1,
    }
}

/// Row pitch of a texture readback, padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip row padding from a readback and decode the texels.
pub fn unpad_rows(data: &[u8], grid: GridSize) -> Vec<Vec4> {
    let padded = padded_bytes_per_row(grid.width) as usize;
    let unpadded = (grid.width * TEXEL_BYTES) as usize;
    let mut texels = Vec::with_capacity(grid.len());
    for row in data.chunks(padded).take(grid.height as usize) {
        for texel in row[..unpadded].chunks_exact(TEXEL_BYTES as usize) {
            texels.push(Vec4::from_array(bytemuck::pod_read_unaligned(texel)));
        }
    }
    texels
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: STATE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: String,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// The two roles of each pair for a given parity.
fn roles(parity: usize) -> (Slot, Slot) {
    if parity == 0 {
        (Slot::A, Slot::B)
    } else {
        (Slot::B, Slot::A)
    }
}

/// Simulation state on the GPU.
///
/// Bind groups are built once per parity, so a frame only selects them.
/// No bind group ever binds the same texture as both a sampled source and a
/// storage target.
pub struct GpuSimulation {
    grid: GridSize,
    state: StateBuffers<StateTexture>,
    _rest: StateTexture,
    uniform_buffer: wgpu::Buffer,
    velocity_pipeline: wgpu::ComputePipeline,
    position_pipeline: wgpu::ComputePipeline,
    /// Indexed by parity.
    velocity_bind_groups: [wgpu::BindGroup; 2],
    position_bind_groups: [wgpu::BindGroup; 2],
}

impl GpuSimulation {
    /// Allocate every state texture and run the one-time initialization upload.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        grid: GridSize,
        rest: &[Vec4],
    ) -> Result<Self, GpuError> {
        grid.validate()?;
        grid.check_records(rest.len())?;

        let max = device.limits().max_texture_dimension_2d;
        if grid.width > max || grid.height > max {
            return Err(GpuError::TextureTooLarge {
                width: grid.width,
                height: grid.height,
                max,
            });
        }

        let state = StateBuffers::new(
            PingPong::new(
                StateTexture::new(device, grid, "Position A"),
                StateTexture::new(device, grid, "Position B"),
            ),
            PingPong::new(
                StateTexture::new(device, grid, "Velocity A"),
                StateTexture::new(device, grid, "Velocity B"),
            ),
        );
        let rest_texture = StateTexture::new(device, grid, "Rest");

        // Both members of each pair start with the same contents.
        let (positions, velocities) = initial_state(rest);
        rest_texture.upload(queue, grid, rest);
        for slot in [Slot::A, Slot::B] {
            state.positions.slot(slot).upload(queue, grid, &positions);
            state.velocities.slot(slot).upload(queue, grid, &velocities);
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sim Uniforms"),
            size: std::mem::size_of::<SimUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let velocity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Velocity Kernel Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                storage_entry(4),
            ],
        });

        let position_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Position Kernel Layout"),
            entries: &[texture_entry(0), texture_entry(1), storage_entry(2)],
        });

        let velocity_bind_groups = [0, 1].map(|parity| {
            let (src, dst) = roles(parity);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Velocity Kernel Bind Group"),
                layout: &velocity_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(
                            &state.positions.slot(src).view,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(
                            &state.velocities.slot(src).view,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&rest_texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(
                            &state.velocities.slot(dst).view,
                        ),
                    },
                ],
            })
        });

        // The integrator reads the velocity the first pass just wrote.
        let position_bind_groups = [0, 1].map(|parity| {
            let (src, dst) = roles(parity);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Position Kernel Bind Group"),
                layout: &position_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(
                            &state.positions.slot(src).view,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(
                            &state.velocities.slot(dst).view,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(
                            &state.positions.slot(dst).view,
                        ),
                    },
                ],
            })
        });

        let velocity_pipeline = compute_pipeline(
            device,
            "Velocity Kernel",
            velocity_kernel_wgsl(),
            &velocity_layout,
        );
        let position_pipeline = compute_pipeline(
            device,
            "Position Kernel",
            position_kernel_wgsl(),
            &position_layout,
        );

        log::debug!("Allocated state textures for a {}x{} grid", grid.width, grid.height);

        Ok(Self {
            grid,
            state,
            _rest: rest_texture,
            uniform_buffer,
            velocity_pipeline,
            position_pipeline,
            velocity_bind_groups,
            position_bind_groups,
        })
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn parity(&self) -> usize {
        self.state.parity()
    }

    /// Completed frames.
    pub fn frames(&self) -> u64 {
        self.state.positions.swaps()
    }

    /// Physical position texture in `slot`, for binding by the renderer.
    pub fn position_view(&self, slot: Slot) -> &wgpu::TextureView {
        &self.state.positions.slot(slot).view
    }

    /// Slot the position kernel writes this frame.
    pub fn position_target_slot(&self) -> Slot {
        roles(self.parity()).1
    }

    /// Record both kernels into `encoder`, velocity first.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        uniforms: &SimUniforms,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let parity = self.parity();
        let groups_x = self.grid.width.div_ceil(WORKGROUP_SIZE);
        let groups_y = self.grid.height.div_ceil(WORKGROUP_SIZE);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Velocity Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.velocity_pipeline);
            pass.set_bind_group(0, &self.velocity_bind_groups[parity], &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Position Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.position_pipeline);
            pass.set_bind_group(0, &self.position_bind_groups[parity], &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
    }

    /// Exchange source and target roles. Call once per frame after submitting.
    pub fn swap(&mut self) {
        self.state.swap();
    }

    /// Copy the current position source back to the CPU.
    ///
    /// Blocks until the GPU has finished all submitted work.
    pub fn read_positions(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Vec<Vec4>, GpuError> {
        let bytes_per_row = padded_bytes_per_row(self.grid.width);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Position Readback"),
            size: bytes_per_row as u64 * self.grid.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.state.positions.source().texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.grid.height),
                },
            },
            extent(self.grid),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let texels = {
            let data = buffer_slice.get_mapped_range();
            unpad_rows(&data, self.grid)
        };
        staging.unmap();
        Ok(texels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pitch_is_aligned() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(16), 256);
        assert_eq!(padded_bytes_per_row(17), 512);
        assert_eq!(padded_bytes_per_row(256), 4096);
    }

    #[test]
    fn test_unpad_rows_drops_padding() {
        let grid = GridSize::new(2, 3).unwrap();
        let pitch = padded_bytes_per_row(2) as usize;
        let mut data = vec![0xFFu8; pitch * 3];
        for row in 0..3 {
            for col in 0..2 {
                let texel = [row as f32, col as f32, 0.5, 1.0];
                let offset = row * pitch + col * 16;
                data[offset..offset + 16].copy_from_slice(bytemuck::bytes_of(&texel));
            }
        }
        let texels = unpad_rows(&data, grid);
        assert_eq!(texels.len(), 6);
        assert_eq!(texels[grid.index(2, 1)], Vec4::new(2.0, 1.0, 0.5, 1.0));
        assert_eq!(texels[grid.index(1, 0)], Vec4::new(1.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn test_roles_never_alias() {
        for parity in 0..2 {
            let (src, dst) = roles(parity);
            assert_ne!(src, dst);
        }
        assert_eq!(roles(0).0, Slot::A);
        assert_eq!(roles(1).0, Slot::B);
    }
}
