//! Simulation builder and runner

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::camera::Camera;
use crate::config::{
    CameraConfig, Distribution, ForceConfig, ForceMode, InteractionModel, PointerConfig,
    RenderConfig, SimConfig,
};
use crate::cpu::FrameStats;
use crate::error::SimulationError;
use crate::gpu::{GpuContext, GpuSimulation, GpuState};
use crate::grid::GridSize;
use crate::pointer::PointerTracker;
use crate::shader::{RenderUniforms, SimUniforms};
use crate::spawn::generate_rest_positions;
use crate::time::Time;

/// Radius of the scripted pointer orbit in headless runs.
const HEADLESS_ORBIT_RADIUS: f32 = 6.0;
/// Frames per headless pointer orbit.
const HEADLESS_ORBIT_FRAMES: f32 = 240.0;

/// A particle field builder.
///
/// Use method chaining to configure, then call `.run()` to open a window or
/// `.run_headless(frames)` to simulate without one.
///
/// ```ignore
/// Simulation::new()
///     .with_grid(GridSize::SMALL)
///     .with_force_mode(ForceMode::Attract)
///     .run()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    config: SimConfig,
}

impl Simulation {
    /// Create a simulation with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete configuration, e.g. one loaded from JSON.
    pub fn from_config(config: SimConfig) -> Self {
        Self { config }
    }

    pub fn with_grid(mut self, grid: GridSize) -> Self {
        self.config.grid = grid;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.config.distribution = distribution;
        self
    }

    /// Fix the distribution seed for reproducible layouts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_forces(mut self, forces: ForceConfig) -> Self {
        self.config.forces = forces;
        self
    }

    pub fn with_force_mode(mut self, mode: ForceMode) -> Self {
        self.config.forces.mode = mode;
        self
    }

    pub fn with_interaction_model(mut self, model: InteractionModel) -> Self {
        self.config.forces.model = model;
        self
    }

    pub fn with_pointer(mut self, pointer: PointerConfig) -> Self {
        self.config.pointer = pointer;
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.config.render = render;
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.config.camera = camera;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn prepare(&self) -> Result<Vec<Vec4>, SimulationError> {
        self.config.validate()?;
        let grid = self.config.grid;
        log::info!(
            "Particle grid {}x{} ({} particles), {:?} field, {:?} mode",
            grid.width,
            grid.height,
            grid.cell_count(),
            self.config.forces.model,
            self.config.forces.mode
        );
        Ok(generate_rest_positions(
            grid,
            &self.config.distribution,
            self.config.seed,
        ))
    }

    /// Open a window and run until it is closed.
    ///
    /// The configuration is validated before any window or GPU resource exists.
    pub fn run(self) -> Result<(), SimulationError> {
        let rest = self.prepare()?;

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self.config, rest);
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Simulate `frames` frames on the GPU without a window, with a scripted
    /// pointer circling the origin, then read back the positions.
    pub fn run_headless(self, frames: u32) -> Result<FrameStats, SimulationError> {
        let rest = self.prepare()?;
        let grid = self.config.grid;

        let ctx = pollster::block_on(GpuContext::headless())?;
        let mut sim = GpuSimulation::new(&ctx.device, &ctx.queue, grid, &rest)?;
        let mut pointer = PointerTracker::new(self.config.pointer);
        let mut time = Time::fixed(1.0 / 60.0);

        for frame in 0..frames {
            let angle = frame as f32 / HEADLESS_ORBIT_FRAMES * TAU;
            pointer.set_world_position(Vec3::new(angle.cos(), angle.sin(), 0.0) * HEADLESS_ORBIT_RADIUS);
            let state = pointer.update();
            let (elapsed, _) = time.update();

            let uniforms = SimUniforms::new(&self.config.forces, &state, elapsed);
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Headless Encoder"),
                });
            sim.record(&mut encoder, &ctx.queue, &uniforms);
            ctx.queue.submit(std::iter::once(encoder.finish()));
            sim.swap();
        }

        let positions = sim.read_positions(&ctx.device, &ctx.queue)?;
        let stats = FrameStats::measure(&positions, &rest);
        log::info!(
            "After {} frames: mean displacement {:.4}, max displacement {:.4}, max speed {:.4}",
            sim.frames(),
            stats.mean_displacement,
            stats.max_displacement,
            stats.max_speed
        );
        Ok(stats)
    }
}

struct App {
    config: SimConfig,
    rest: Vec<Vec4>,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    camera: Camera,
    pointer: PointerTracker,
    time: Time,
    error: Option<SimulationError>,
}

impl App {
    fn new(config: SimConfig, rest: Vec<Vec4>) -> Self {
        let camera = Camera::new(&config.camera, 16.0 / 9.0);
        let pointer = PointerTracker::new(config.pointer);
        Self {
            config,
            rest,
            window: None,
            gpu_state: None,
            camera,
            pointer,
            time: Time::new(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SimulationError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) else {
            return;
        };

        let (elapsed, _) = self.time.update();
        let forces = &self.config.forces;
        let pointer = &mut self.pointer;

        let render_uniforms = RenderUniforms::new(
            self.camera.view_proj(),
            &self.config.render,
            gpu_state.size(),
            window.scale_factor() as f32,
        );

        let sim_uniforms = || SimUniforms::new(forces, &pointer.update(), elapsed);
        match gpu_state.frame(sim_uniforms, &render_uniforms) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu_state.reconfigure()
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }

        if self.time.frame() % 300 == 0 {
            log::debug!(
                "{:.1} fps, frame {}, hover {:.2}",
                self.time.fps(),
                gpu_state.sim().frames(),
                self.pointer.hover()
            );
        }

        window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("Ping-pong particle field")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let size = window.inner_size();
        self.camera.set_aspect(size.width, size.height);

        match pollster::block_on(GpuState::new(
            window.clone(),
            self.config.grid,
            &self.rest,
            &self.config.render,
        )) {
            Ok(gpu_state) => {
                self.gpu_state = Some(gpu_state);
                self.window = Some(window.clone());
                window.request_redraw();
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
                self.camera
                    .set_aspect(physical_size.width, physical_size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(gpu_state) = &self.gpu_state {
                    self.pointer.on_pointer_move(
                        Vec2::new(position.x as f32, position.y as f32),
                        gpu_state.size(),
                        &self.camera,
                    );
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer.on_pointer_leave();
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
