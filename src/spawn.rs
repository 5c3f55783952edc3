//! Initial distribution of rest positions.
//!
//! Produces one `(x, y, z, variation)` record per grid cell, in flat index order.
//! `variation` is an independent uniform draw in `[0, 1)` that the kernels use
//! as a per-particle seed (pseudo-mass, spring jitter). It is generated once and
//! lives in the immutable rest texture, so it never changes for a cell.

use glam::{Vec3, Vec4};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::config::Distribution;
use crate::grid::GridSize;

/// Generates rest records for a grid.
pub struct SpawnContext {
    grid: GridSize,
    rng: SmallRng,
}

impl SpawnContext {
    /// Create a generator. `None` seeds from the system clock.
    pub fn new(grid: GridSize, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(42)
        });

        Self {
            grid,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Random f32 between 0.0 and 1.0.
    #[inline]
    fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Rest position for the cell at `(row, col)`.
    fn position(&mut self, distribution: &Distribution, row: u32, col: u32) -> Vec3 {
        match *distribution {
            Distribution::Stratified {
                extent,
                aspect,
                jitter,
            } => {
                let range_x = extent * aspect;
                let range_y = extent;
                let jitter_x = jitter / self.grid.width as f32;
                let jitter_y = jitter / self.grid.height as f32;

                let u = (col as f32 + 0.5) / self.grid.width as f32
                    + (self.random() - 0.5) * jitter_x;
                let v = (row as f32 + 0.5) / self.grid.height as f32
                    + (self.random() - 0.5) * jitter_y;

                Vec3::new(u * range_x - range_x * 0.5, v * range_y - range_y * 0.5, 0.0)
            }
            Distribution::Radial { max_radius, power } => {
                let theta = self.rng.gen_range(0.0..TAU);
                let r = self.random().powf(power) * max_radius;
                Vec3::new(r * theta.cos(), r * theta.sin(), 0.0)
            }
        }
    }

    /// Generate the rest record of every cell.
    pub fn generate(&mut self, distribution: &Distribution) -> Vec<Vec4> {
        let mut records = Vec::with_capacity(self.grid.len());
        for row in 0..self.grid.height {
            for col in 0..self.grid.width {
                let position = self.position(distribution, row, col);
                let variation = self.random();
                records.push(position.extend(variation));
            }
        }
        records
    }
}

/// Convenience wrapper: generate rest records for `grid` with `distribution`.
pub fn generate_rest_positions(
    grid: GridSize,
    distribution: &Distribution,
    seed: Option<u64>,
) -> Vec<Vec4> {
    SpawnContext::new(grid, seed).generate(distribution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stratified() -> Distribution {
        Distribution::Stratified {
            extent: 30.0,
            aspect: 2.0,
            jitter: 0.8,
        }
    }

    #[test]
    fn test_one_record_per_cell() {
        let grid = GridSize::new(16, 8).unwrap();
        let records = generate_rest_positions(grid, &stratified(), Some(1));
        assert_eq!(records.len(), 128);
    }

    #[test]
    fn test_same_seed_same_records() {
        let grid = GridSize::square(8).unwrap();
        let a = generate_rest_positions(grid, &stratified(), Some(7));
        let b = generate_rest_positions(grid, &stratified(), Some(7));
        let c = generate_rest_positions(grid, &stratified(), Some(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_stratified_stays_within_jitter_of_cell_center() {
        let grid = GridSize::square(16).unwrap();
        let records = generate_rest_positions(grid, &stratified(), Some(3));
        let (range_x, range_y) = (60.0, 30.0);
        // Jitter spans 0.8 of a cell, so each point stays within 0.4 cells of its center.
        let bound_x = 0.4 * range_x / 16.0 + 1e-4;
        let bound_y = 0.4 * range_y / 16.0 + 1e-4;

        for (index, record) in records.iter().enumerate() {
            let (row, col) = grid.cell(index);
            let center_x = (col as f32 + 0.5) / 16.0 * range_x - range_x * 0.5;
            let center_y = (row as f32 + 0.5) / 16.0 * range_y - range_y * 0.5;
            assert!((record.x - center_x).abs() <= bound_x);
            assert!((record.y - center_y).abs() <= bound_y);
            assert_eq!(record.z, 0.0);
        }
    }

    #[test]
    fn test_variation_in_unit_interval() {
        let grid = GridSize::square(32).unwrap();
        let records = generate_rest_positions(grid, &stratified(), Some(11));
        assert!(records.iter().all(|r| (0.0..1.0).contains(&r.w)));
        let mean = records.iter().map(|r| r.w).sum::<f32>() / records.len() as f32;
        assert!((mean - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_radial_bias_toward_center() {
        let grid = GridSize::square(64).unwrap();
        let max_radius = 10.0;
        let records = generate_rest_positions(
            grid,
            &Distribution::Radial {
                max_radius,
                power: 3.0,
            },
            Some(5),
        );

        assert!(records
            .iter()
            .all(|r| r.truncate().length() <= max_radius + 1e-4));

        // With power 3, P(r < R/2) = (1/2)^(1/3) ≈ 0.79.
        let inner = records
            .iter()
            .filter(|r| r.truncate().length() < max_radius * 0.5)
            .count() as f32
            / records.len() as f32;
        assert!(inner > 0.7, "inner fraction {}", inner);
    }
}
