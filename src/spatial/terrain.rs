//! Terrain height queries
//!
//! The host owns the real terrain; the tactical layer only asks for heights.
//! `HeightField` and `FlatTerrain` are in-memory implementations used by the
//! sandbox host and by tests.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Default sampling step along a ray (world units)
pub const RAY_STEP: f32 = 10.0;

/// Number of samples taken on the ring around a point
const RING_SAMPLES: usize = 8;

/// Read-only terrain height source
pub trait TerrainQuery {
    /// Ground height at a point on the ground plane
    fn height_at(&self, point: Vec2) -> f32;

    /// World position of a ground point, lifted to terrain height
    fn surface(&self, point: Vec2) -> Vec3 {
        point.extend(self.height_at(point))
    }

    /// Mean height of a ring of samples at `radius` around `center`
    fn average_surrounding_height(&self, center: Vec2, radius: f32) -> f32 {
        let total: f32 = (0..RING_SAMPLES)
            .map(|i| {
                let angle = i as f32 * std::f32::consts::TAU / RING_SAMPLES as f32;
                self.height_at(center + Vec2::from_angle(angle) * radius)
            })
            .sum();
        total / RING_SAMPLES as f32
    }

    /// Highest surface point on the ray from `start` along `direction`,
    /// sampled every `step` units up to `max_distance`.
    ///
    /// Returns the start point when nothing along the ray is higher.
    fn highest_point_along(&self, start: Vec2, direction: Vec2, max_distance: f32, step: f32) -> Vec3 {
        let direction = direction.normalize_or_zero();
        let mut best = self.surface(start);
        if direction == Vec2::ZERO || step <= 0.0 {
            return best;
        }

        let mut distance = step;
        while distance <= max_distance {
            let candidate = self.surface(start + direction * distance);
            if candidate.z > best.z {
                best = candidate;
            }
            distance += step;
        }
        best
    }
}

/// Perfectly level ground at a fixed height
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FlatTerrain {
    pub height: f32,
}

impl TerrainQuery for FlatTerrain {
    fn height_at(&self, _point: Vec2) -> f32 {
        self.height
    }
}

/// Regular grid of height samples with bilinear interpolation
///
/// Points outside the grid clamp to the nearest edge sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightField {
    /// World position of sample (0, 0)
    pub origin: Vec2,
    /// Distance between adjacent samples
    pub cell_size: f32,
    pub columns: usize,
    pub rows: usize,
    /// Row-major heights, `columns * rows` entries
    heights: Vec<f32>,
}

impl HeightField {
    /// Create a level field of the given dimensions
    pub fn new(origin: Vec2, cell_size: f32, columns: usize, rows: usize) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            origin,
            cell_size: cell_size.max(f32::EPSILON),
            columns,
            rows,
            heights: vec![0.0; columns * rows],
        }
    }

    /// Build a field by sampling a height function at every grid point
    pub fn from_fn(
        origin: Vec2,
        cell_size: f32,
        columns: usize,
        rows: usize,
        height: impl Fn(Vec2) -> f32,
    ) -> Self {
        let mut field = Self::new(origin, cell_size, columns, rows);
        for row in 0..field.rows {
            for col in 0..field.columns {
                let point = field.origin + Vec2::new(col as f32, row as f32) * field.cell_size;
                field.heights[row * field.columns + col] = height(point);
            }
        }
        field
    }

    /// Set one grid sample; out-of-range indices are ignored
    pub fn set(&mut self, col: usize, row: usize, height: f32) {
        if col < self.columns && row < self.rows {
            self.heights[row * self.columns + col] = height;
        }
    }

    fn sample(&self, col: usize, row: usize) -> f32 {
        let col = col.min(self.columns - 1);
        let row = row.min(self.rows - 1);
        self.heights[row * self.columns + col]
    }
}

impl TerrainQuery for HeightField {
    fn height_at(&self, point: Vec2) -> f32 {
        let local = ((point - self.origin) / self.cell_size).max(Vec2::ZERO);
        let col = local.x.floor() as usize;
        let row = local.y.floor() as usize;
        let tx = (local.x - col as f32).clamp(0.0, 1.0);
        let ty = (local.y - row as f32).clamp(0.0, 1.0);

        let h00 = self.sample(col, row);
        let h10 = self.sample(col + 1, row);
        let h01 = self.sample(col, row + 1);
        let h11 = self.sample(col + 1, row + 1);

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> HeightField {
        // Height rises one unit per world unit along +x
        HeightField::from_fn(Vec2::ZERO, 10.0, 21, 21, |p| p.x)
    }

    #[test]
    fn test_flat_terrain() {
        let flat = FlatTerrain { height: 4.0 };
        assert_eq!(flat.height_at(Vec2::new(100.0, -20.0)), 4.0);
        assert_eq!(flat.average_surrounding_height(Vec2::ZERO, 20.0), 4.0);
    }

    #[test]
    fn test_heightfield_interpolates() {
        let field = ramp();
        assert!((field.height_at(Vec2::new(15.0, 40.0)) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_heightfield_clamps_outside() {
        let field = ramp();
        assert!((field.height_at(Vec2::new(-50.0, 0.0)) - 0.0).abs() < 1e-4);
        assert!((field.height_at(Vec2::new(500.0, 0.0)) - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_highest_point_along_ray() {
        let field = ramp();
        let best = field.highest_point_along(Vec2::new(50.0, 50.0), Vec2::X, 100.0, RAY_STEP);
        assert!((best.x - 150.0).abs() < 1e-3);
        assert!((best.z - 150.0).abs() < 1e-3);

        // Walking downhill keeps the start point
        let start = field.highest_point_along(Vec2::new(50.0, 50.0), -Vec2::X, 100.0, RAY_STEP);
        assert!((start.x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_direction_returns_start() {
        let field = ramp();
        let best = field.highest_point_along(Vec2::new(20.0, 20.0), Vec2::ZERO, 100.0, RAY_STEP);
        assert!((best.x - 20.0).abs() < 1e-3);
    }
}
