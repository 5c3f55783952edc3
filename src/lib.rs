//! # pingpong-particles
//!
//! A fixed grid of particles simulated on the GPU with double-buffered
//! ("ping-pong") state textures.
//!
//! Every particle owns one texel. Each frame two compute passes run:
//!
//! 1. **Velocity kernel**: spring back toward the particle's rest position, a
//!    pointer field (ring band or radial shockwave), simplex-noise variation,
//!    damping, and a hard speed clamp.
//! 2. **Integrator**: `position += velocity`, with `|velocity|` packed into the
//!    fourth channel for the renderer.
//!
//! Each pass reads the *source* member of a buffer pair and writes the *target*.
//! The roles swap once per frame, so no pass ever reads and writes the same
//! texture.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pingpong_particles::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     Simulation::new()
//!         .with_grid(GridSize::LARGE)
//!         .with_force_mode(ForceMode::Repel)
//!         .with_interaction_model(InteractionModel::Ring)
//!         .run()
//! }
//! ```
//!
//! ## Without a GPU
//!
//! [`CpuSimulation`] runs the same kernels on the CPU over `Vec<Vec4>` pairs.
//! The tests and benchmarks use it.
//!
//! ```ignore
//! let mut sim = CpuSimulation::from_config(&SimConfig::default())?;
//! let mut pointer = PointerTracker::default();
//! pointer.set_world_position(Vec3::ZERO);
//! for frame in 0..120 {
//!     sim.step(&pointer.update(), frame as f32 / 60.0);
//! }
//! println!("{:?}", sim.stats());
//! ```
//!
//! ## Configuration
//!
//! [`SimConfig`] is plain serde data. Load it from JSON with
//! [`SimConfig::load`]; missing fields take their defaults.

pub mod buffers;
pub mod camera;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod grid;
pub mod kernels;
pub mod noise;
pub mod pointer;
pub mod shader;
mod simulation;
pub mod spawn;
pub mod time;

pub use buffers::{PingPong, Slot, StateBuffers};
pub use camera::{Camera, Projector};
pub use config::{
    CameraConfig, Distribution, ForceConfig, ForceMode, InteractionModel, PointerConfig,
    RenderConfig, SimConfig,
};
pub use cpu::{CpuSimulation, FrameStats};
pub use error::{ConfigError, GpuError, SimulationError};
pub use glam::{Vec2, Vec3, Vec4};
pub use grid::GridSize;
pub use pointer::{PointerState, PointerTracker};
pub use simulation::Simulation;
pub use spawn::generate_rest_positions;
pub use time::Time;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::config::{
        Distribution, ForceConfig, ForceMode, InteractionModel, PointerConfig, RenderConfig,
        SimConfig,
    };
    pub use crate::cpu::CpuSimulation;
    pub use crate::error::SimulationError;
    pub use crate::grid::GridSize;
    pub use crate::pointer::{PointerState, PointerTracker};
    pub use crate::simulation::Simulation;
    pub use glam::{Vec2, Vec3, Vec4};
}
