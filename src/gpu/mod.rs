//! wgpu device setup and the per-frame GPU pipeline.
//!
//! [`GpuState`] owns a window surface, the simulation textures and the point
//! renderer. [`GpuContext`] is the same device setup without a surface, used by
//! headless runs.

mod render;
mod state;

use std::sync::Arc;

use glam::Vec4;
use winit::window::Window;

pub use render::{point_color, point_size_px, PointRenderer};
pub use state::{padded_bytes_per_row, unpad_rows, GpuSimulation, StateTexture};

use crate::config::RenderConfig;
use crate::error::GpuError;
use crate::grid::GridSize;
use crate::shader::{RenderUniforms, SimUniforms};

async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), GpuError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("Using adapter {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    Ok((adapter, device, queue))
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

/// A device and queue with no surface.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn headless() -> Result<Self, GpuError> {
        let instance = new_instance();
        let (_adapter, device, queue) = request_device(&instance, None).await?;
        Ok(Self { device, queue })
    }
}

/// Windowed GPU state: surface, simulation and renderer.
pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    sim: GpuSimulation,
    renderer: PointRenderer,
    background: wgpu::Color,
}

impl GpuState {
    pub async fn new(
        window: Arc<Window>,
        grid: GridSize,
        rest: &[Vec4],
        render: &RenderConfig,
    ) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = new_instance();
        let surface = instance.create_surface(window)?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::IncompatibleSurface)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sim = GpuSimulation::new(&device, &queue, grid, rest)?;
        let renderer = PointRenderer::new(&device, config.format, &sim);

        let [r, g, b] = render.background;
        let background = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            sim,
            renderer,
            background,
        })
    }

    /// Surface size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn sim(&self) -> &GpuSimulation {
        &self.sim
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Reapply the current configuration after the surface was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Run one frame: velocity kernel, integrator, render of the position
    /// target, present, swap.
    ///
    /// `sim_uniforms` is called only once the surface texture is acquired. If
    /// acquisition fails, nothing is simulated, the roles are left unchanged and
    /// no pointer sample is consumed.
    pub fn frame(
        &mut self,
        sim_uniforms: impl FnOnce() -> SimUniforms,
        render_uniforms: &RenderUniforms,
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let sim_uniforms = sim_uniforms();
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.sim.record(&mut encoder, &self.queue, &sim_uniforms);
        self.renderer.update(&self.queue, render_uniforms);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .draw(&mut render_pass, self.sim.position_target_slot());
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.sim.swap();

        Ok(())
    }
}
