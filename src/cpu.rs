//! CPU reference backend.
//!
//! Runs the same two kernels as the GPU backend over `Vec<Vec4>` ping-pong
//! pairs. Useful for tests, benchmarks and machines without an adapter.

use glam::{Vec4, Vec4Swizzles};

use crate::buffers::{PingPong, StateBuffers};
use crate::config::{ForceConfig, SimConfig};
use crate::error::ConfigError;
use crate::grid::GridSize;
use crate::kernels::{position_kernel, velocity_kernel};
use crate::pointer::PointerState;
use crate::spawn::generate_rest_positions;

/// Summary of one frame's state, used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Mean distance from home over all particles.
    pub mean_displacement: f32,
    /// Largest distance from home.
    pub max_displacement: f32,
    /// Largest packed speed.
    pub max_speed: f32,
}

impl FrameStats {
    /// Measure `positions` (xyz + packed speed) against `rest`.
    pub fn measure(positions: &[Vec4], rest: &[Vec4]) -> Self {
        if positions.is_empty() {
            return Self::default();
        }
        let mut stats = Self::default();
        let mut total = 0.0f64;
        for (p, r) in positions.iter().zip(rest) {
            let d = p.xyz().distance(r.xyz());
            total += d as f64;
            stats.max_displacement = stats.max_displacement.max(d);
            stats.max_speed = stats.max_speed.max(p.w);
        }
        stats.mean_displacement = (total / positions.len() as f64) as f32;
        stats
    }
}

/// Initial position and velocity records for a set of rest records.
///
/// Position starts at home with zero speed, velocity starts at zero.
pub fn initial_state(rest: &[Vec4]) -> (Vec<Vec4>, Vec<Vec4>) {
    let positions = rest.iter().map(|r| r.xyz().extend(0.0)).collect();
    let velocities = vec![Vec4::ZERO; rest.len()];
    (positions, velocities)
}

/// Particle field simulated on the CPU.
#[derive(Debug)]
pub struct CpuSimulation {
    grid: GridSize,
    forces: ForceConfig,
    rest: Vec<Vec4>,
    state: StateBuffers<Vec<Vec4>>,
}

impl CpuSimulation {
    /// Build a simulation from explicit rest records.
    pub fn new(grid: GridSize, rest: Vec<Vec4>, forces: ForceConfig) -> Result<Self, ConfigError> {
        grid.validate()?;
        grid.check_records(rest.len())?;
        let (positions, velocities) = initial_state(&rest);
        Ok(Self {
            grid,
            forces,
            rest,
            state: StateBuffers::new(
                PingPong::from_initial(positions),
                PingPong::from_initial(velocities),
            ),
        })
    }

    /// Validate `config`, generate its rest distribution and initialize.
    pub fn from_config(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rest = generate_rest_positions(config.grid, &config.distribution, config.seed);
        Self::new(config.grid, rest, config.forces)
    }

    /// Velocity pass: reads both sources, writes the velocity target.
    pub fn velocity_pass(&mut self, pointer: &PointerState, time: f32) {
        let positions = self.state.positions.source();
        let (velocities, out) = self.state.velocities.source_and_target_mut();
        for (i, dst) in out.iter_mut().enumerate() {
            *dst = velocity_kernel(
                positions[i],
                velocities[i],
                self.rest[i],
                pointer,
                time,
                &self.forces,
            );
        }
    }

    /// Position pass: reads the position source and the fresh velocity target.
    pub fn position_pass(&mut self) {
        let velocities = self.state.velocities.target();
        let (positions, out) = self.state.positions.source_and_target_mut();
        for ((dst, pos), vel) in out.iter_mut().zip(positions).zip(velocities) {
            *dst = position_kernel(*pos, *vel);
        }
    }

    /// Swap both pairs.
    pub fn swap(&mut self) {
        self.state.swap();
    }

    /// Run one full frame: both kernels, then swap.
    pub fn step(&mut self, pointer: &PointerState, time: f32) {
        self.velocity_pass(pointer, time);
        self.position_pass();
        self.swap();
    }

    /// Latest positions. Between frames this is the source.
    pub fn positions(&self) -> &[Vec4] {
        self.state.positions.source()
    }

    /// Latest velocities.
    pub fn velocities(&self) -> &[Vec4] {
        self.state.velocities.source()
    }

    /// Position target. After a pass and before the swap it holds the new frame.
    pub fn position_target(&self) -> &[Vec4] {
        self.state.positions.target()
    }

    pub fn rest(&self) -> &[Vec4] {
        &self.rest
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn forces(&self) -> &ForceConfig {
        &self.forces
    }

    pub fn set_forces(&mut self, forces: ForceConfig) {
        self.forces = forces;
    }

    pub fn parity(&self) -> usize {
        self.state.parity()
    }

    /// Completed frames.
    pub fn frames(&self) -> u64 {
        self.state.positions.swaps()
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats::measure(self.positions(), &self.rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn steady_forces() -> ForceConfig {
        ForceConfig {
            return_strength: 0.05,
            return_jitter: 0.0,
            damping: 0.9,
            damping_variance: 0.0,
            mass_variance: 0.0,
            ..Default::default()
        }
    }

    fn two_by_two(forces: ForceConfig) -> CpuSimulation {
        let grid = GridSize::square(2).unwrap();
        let rest = vec![
            Vec4::new(-1.0, -1.0, 0.0, 0.1),
            Vec4::new(1.0, -1.0, 0.0, 0.4),
            Vec4::new(-1.0, 1.0, 0.0, 0.6),
            Vec4::new(1.0, 1.0, 0.0, 0.9),
        ];
        CpuSimulation::new(grid, rest, forces).unwrap()
    }

    fn max_error(sim: &CpuSimulation) -> f32 {
        sim.stats().max_displacement
    }

    #[test]
    fn test_initial_state_matches_rest() {
        let sim = two_by_two(steady_forces());
        for (pos, rest) in sim.positions().iter().zip(sim.rest()) {
            assert_eq!(pos.xyz(), rest.xyz());
            assert_eq!(pos.w, 0.0);
        }
        assert!(sim.velocities().iter().all(|v| *v == Vec4::ZERO));
        // Both members of each pair start identical.
        assert_eq!(sim.position_target(), sim.positions());
    }

    #[test]
    fn test_rest_count_must_match_grid() {
        let grid = GridSize::square(2).unwrap();
        let result = CpuSimulation::new(grid, vec![Vec4::ZERO; 3], ForceConfig::default());
        assert!(matches!(
            result,
            Err(ConfigError::ParticleCountMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_returns_home_without_pointer() {
        let mut sim = two_by_two(steady_forces());
        for p in sim.state.positions.source_mut().iter_mut() {
            *p += Vec4::new(0.05, -0.05, 0.0, 0.0);
        }
        assert!(max_error(&sim) > 0.07);

        let pointer = PointerState::idle();
        for frame in 0..100 {
            sim.step(&pointer, frame as f32 / 60.0);
        }
        assert!(max_error(&sim) < 1e-3);
    }

    #[test]
    fn test_displaced_particles_settle_home() {
        let mut sim = two_by_two(steady_forces());
        for v in sim.state.velocities.source_mut().iter_mut() {
            *v = Vec4::new(0.05, -0.03, 0.0, 0.0);
        }
        let pointer = PointerState::idle();
        for frame in 0..300 {
            sim.step(&pointer, frame as f32 / 60.0);
        }
        assert!(max_error(&sim) < 1e-3, "error {}", max_error(&sim));
    }

    #[test]
    fn test_error_envelope_never_grows() {
        let mut sim = two_by_two(steady_forces());
        for p in sim.state.positions.source_mut().iter_mut() {
            *p += Vec4::new(0.5, 0.0, 0.0, 0.0);
        }
        let pointer = PointerState::idle();

        // Spring plus damping rings, so compare peaks over windows longer
        // than one oscillation period.
        let mut previous = f32::INFINITY;
        let mut frame = 0;
        for _ in 0..6 {
            let mut peak = 0.0f32;
            for _ in 0..60 {
                sim.step(&pointer, frame as f32 / 60.0);
                peak = peak.max(max_error(&sim));
                frame += 1;
            }
            assert!(peak <= previous + 1e-6, "{} > {}", peak, previous);
            previous = peak;
        }
        assert!(previous < 0.05);
    }

    #[test]
    fn test_parity_alternates_each_frame() {
        let mut sim = two_by_two(steady_forces());
        let pointer = PointerState::idle();
        for k in 0..8 {
            assert_eq!(sim.parity(), k % 2);
            assert_eq!(sim.frames(), k as u64);
            sim.step(&pointer, 0.0);
        }
    }

    #[test]
    fn test_passes_write_only_targets() {
        let mut sim = two_by_two(steady_forces());
        let pointer = PointerState {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            hover: 1.0,
        };
        let before = sim.positions().to_vec();
        sim.set_forces(ForceConfig {
            ring_radius: 1.4,
            ring_width: 1.0,
            ..steady_forces()
        });
        sim.velocity_pass(&pointer, 0.0);
        sim.position_pass();
        assert_eq!(sim.positions(), before.as_slice());
        assert_ne!(sim.position_target(), before.as_slice());
        sim.swap();
        assert_ne!(sim.positions(), before.as_slice());
    }

    #[test]
    fn test_packed_speed_matches_velocity() {
        let mut sim = two_by_two(steady_forces());
        for p in sim.state.positions.source_mut().iter_mut() {
            *p += Vec4::new(0.0, 0.3, 0.0, 0.0);
        }
        sim.step(&PointerState::idle(), 0.0);
        for (pos, vel) in sim.positions().iter().zip(sim.velocities()) {
            assert!((pos.w - vel.xyz().length()).abs() < 1e-6);
        }
    }
}
