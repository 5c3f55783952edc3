//! Particle grid addressing.
//!
//! Every particle owns one texel of a `width × height` state texture. The cell
//! `(row, col)` never changes for the lifetime of the process and maps to the
//! flat index `row * width + col`, which is also the draw instance index.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted grid side. Devices may impose a lower limit, which the GPU
/// backend checks separately.
pub const MAX_GRID_SIDE: u32 = 4096;

/// Dimensions of the particle grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    /// 128 × 128 = 16,384 particles.
    pub const SMALL: GridSize = GridSize {
        width: 128,
        height: 128,
    };

    /// 256 × 256 = 65,536 particles.
    pub const LARGE: GridSize = GridSize {
        width: 256,
        height: 256,
    };

    /// Create a grid, rejecting empty or oversized dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        let grid = Self { width, height };
        grid.validate()?;
        Ok(grid)
    }

    /// Square grid of `side × side` cells.
    pub fn square(side: u32) -> Result<Self, ConfigError> {
        Self::new(side, side)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0
            || self.height == 0
            || self.width > MAX_GRID_SIDE
            || self.height > MAX_GRID_SIDE
        {
            return Err(ConfigError::InvalidGrid {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Check that `records` holds exactly one entry per cell.
    pub fn check_records(&self, records: usize) -> Result<(), ConfigError> {
        if records != self.len() {
            return Err(ConfigError::ParticleCountMismatch {
                expected: self.cell_count(),
                actual: records as u32,
            });
        }
        Ok(())
    }

    /// Total number of particles.
    #[inline]
    pub fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cell_count() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    /// Flat index of `(row, col)`.
    #[inline]
    pub fn index(&self, row: u32, col: u32) -> usize {
        (row * self.width + col) as usize
    }

    /// `(row, col)` of a flat index.
    #[inline]
    pub fn cell(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        (index / self.width, index % self.width)
    }

    /// Texel-center UV for the cell at `(row, col)`.
    #[inline]
    pub fn uv(&self, row: u32, col: u32) -> Vec2 {
        Vec2::new(
            (col as f32 + 0.5) / self.width as f32,
            (row as f32 + 0.5) / self.height as f32,
        )
    }

    /// Inverse of [`GridSize::uv`]. Returns `None` for UVs outside the grid.
    pub fn cell_from_uv(&self, uv: Vec2) -> Option<(u32, u32)> {
        let col = (uv.x * self.width as f32 - 0.5).round();
        let row = (uv.y * self.height as f32 - 0.5).round();
        if col < 0.0 || row < 0.0 || col >= self.width as f32 || row >= self.height as f32 {
            return None;
        }
        Some((row as u32, col as u32))
    }

    /// Lookup table mapping point index to the UV of its state texel.
    ///
    /// Entry `row * width + col` holds `((col + 0.5) / W, (row + 0.5) / H)`.
    pub fn reference_uvs(&self) -> Vec<Vec2> {
        let mut uvs = Vec::with_capacity(self.len());
        for row in 0..self.height {
            for col in 0..self.width {
                uvs.push(self.uv(row, col));
            }
        }
        uvs
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::LARGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_uvs_are_bijective() {
        let grid = GridSize::square(4).unwrap();
        let uvs = grid.reference_uvs();
        assert_eq!(uvs.len(), 16);

        let mut seen = std::collections::HashSet::new();
        for (index, uv) in uvs.iter().enumerate() {
            let (row, col) = grid.cell(index);
            assert_eq!(grid.cell_from_uv(*uv), Some((row, col)));
            assert!(seen.insert((row, col)));
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn test_uv_is_texel_center() {
        let grid = GridSize::square(4).unwrap();
        assert_eq!(grid.uv(0, 0), Vec2::new(0.125, 0.125));
        assert_eq!(grid.uv(3, 1), Vec2::new(0.375, 0.875));
    }

    #[test]
    fn test_index_round_trip() {
        let grid = GridSize::new(8, 3).unwrap();
        for index in 0..grid.len() {
            let (row, col) = grid.cell(index);
            assert_eq!(grid.index(row, col), index);
        }
    }

    #[test]
    fn test_cell_from_uv_rejects_outside() {
        let grid = GridSize::square(4).unwrap();
        assert_eq!(grid.cell_from_uv(Vec2::new(1.2, 0.5)), None);
        assert_eq!(grid.cell_from_uv(Vec2::new(0.5, -0.3)), None);
    }

    #[test]
    fn test_check_records() {
        let grid = GridSize::square(4).unwrap();
        assert!(grid.check_records(16).is_ok());
        assert!(matches!(
            grid.check_records(3),
            Err(ConfigError::ParticleCountMismatch {
                expected: 16,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_invalid_grid() {
        assert!(GridSize::new(0, 128).is_err());
        assert!(GridSize::new(128, MAX_GRID_SIDE + 1).is_err());
        assert!(GridSize::new(128, 128).is_ok());
    }
}
