//! Geometry and terrain queries
//!
//! Ground-plane math uses `glam::Vec2` (x, y); world positions are
//! `glam::Vec3` with height in `z`.

pub mod terrain;
pub mod vectors;

pub use terrain::{FlatTerrain, HeightField, TerrainQuery, RAY_STEP};
pub use vectors::{
    direction_to, flank_side, flank_vector, ground, left_of, right_of, FlankSide,
};
