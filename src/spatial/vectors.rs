//! Flank and perpendicular vector helpers

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Side of a formation relative to its facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlankSide {
    Left,
    Right,
    Rear,
}

/// Project a world position onto the ground plane
pub fn ground(position: Vec3) -> Vec2 {
    position.truncate()
}

/// Unit vector from `from` toward `to`, zero when the points coincide
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}

/// Perpendicular to the right of a facing direction
pub fn right_of(facing: Vec2) -> Vec2 {
    Vec2::new(facing.y, -facing.x)
}

/// Perpendicular to the left of a facing direction
pub fn left_of(facing: Vec2) -> Vec2 {
    Vec2::new(-facing.y, facing.x)
}

/// Outward unit vector for one side of a formation facing `facing`
pub fn flank_vector(facing: Vec2, side: FlankSide) -> Vec2 {
    let facing = facing.normalize_or_zero();
    match side {
        FlankSide::Left => left_of(facing),
        FlankSide::Right => right_of(facing),
        FlankSide::Rear => -facing,
    }
}

/// Which side of a formation at `target` (facing `facing`) is exposed to
/// an observer at `observer`.
///
/// Observers clearly behind the formation see its rear; otherwise the
/// side is picked by the sign of the cross product.
pub fn flank_side(target: Vec2, facing: Vec2, observer: Vec2) -> FlankSide {
    let to_observer = direction_to(target, observer);
    let facing = facing.normalize_or_zero();
    if facing.dot(to_observer) < -0.5 {
        return FlankSide::Rear;
    }
    if facing.perp_dot(to_observer) > 0.0 {
        FlankSide::Left
    } else {
        FlankSide::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_perpendiculars_are_orthogonal() {
        let facing = Vec2::new(0.6, 0.8);
        assert!(right_of(facing).dot(facing).abs() < EPS);
        assert!(left_of(facing).dot(facing).abs() < EPS);
        assert!((right_of(facing) + left_of(facing)).length() < EPS);
    }

    #[test]
    fn test_right_of_north_is_east() {
        let right = right_of(Vec2::Y);
        assert!((right - Vec2::X).length() < EPS);
    }

    #[test]
    fn test_direction_to_same_point_is_zero() {
        assert_eq!(direction_to(Vec2::ONE, Vec2::ONE), Vec2::ZERO);
    }

    #[test]
    fn test_flank_side_detection() {
        let target = Vec2::ZERO;
        let facing = Vec2::Y;
        assert_eq!(flank_side(target, facing, Vec2::new(0.0, -50.0)), FlankSide::Rear);
        assert_eq!(flank_side(target, facing, Vec2::new(-50.0, 5.0)), FlankSide::Left);
        assert_eq!(flank_side(target, facing, Vec2::new(50.0, 5.0)), FlankSide::Right);
    }

    #[test]
    fn test_ground_drops_height() {
        assert_eq!(ground(Vec3::new(3.0, 4.0, 7.0)), Vec2::new(3.0, 4.0));
    }
}
