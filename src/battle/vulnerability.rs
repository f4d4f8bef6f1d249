//! Vulnerability scoring: how exposed an enemy group is to a given attacker
//!
//! The score adds five factors:
//! - type matchup (cavalry against archers is the classic mismatch)
//! - distance (closer is more vulnerable, normalized over 200 units)
//! - isolation (distance to the target's nearest ally, over 150 units, ×1.5)
//! - terrain (standing below the surroundings +0.5, above −0.3)
//! - facing and shape (flanked lines, end-on columns, braced spears, shield walls)

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::battle::groups::{GroupState, Shape, UnitClass};
use crate::spatial::{direction_to, TerrainQuery};

pub const DISTANCE_NORMALIZER: f32 = 200.0;
pub const ISOLATION_NORMALIZER: f32 = 150.0;
pub const ISOLATION_WEIGHT: f32 = 1.5;
/// Radius of the ring used to judge whether a target sits low or high
pub const TERRAIN_PROBE_RADIUS: f32 = 20.0;
const TERRAIN_TOLERANCE: f32 = 0.05;

/// Per-factor breakdown of a vulnerability score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VulnerabilityScore {
    pub matchup: f32,
    pub distance: f32,
    pub isolation: f32,
    pub terrain: f32,
    pub facing: f32,
}

impl VulnerabilityScore {
    pub fn total(&self) -> f32 {
        self.matchup + self.distance + self.isolation + self.terrain + self.facing
    }
}

/// Fixed attacker-versus-defender bonus
pub fn matchup_bonus(attacker: UnitClass, defender: UnitClass) -> f32 {
    use UnitClass::*;
    match (attacker, defender) {
        (Cavalry, Ranged) => 2.0,
        (Cavalry, Infantry) => 0.5,
        (Cavalry, _) => 1.0,
        (Infantry, Cavalry) => 1.5,
        (Infantry, _) => 1.0,
        (Ranged | MountedRanged, Infantry) => 1.5,
        (Ranged | MountedRanged, Cavalry) => 0.5,
        (Ranged | MountedRanged, _) => 1.0,
    }
}

/// Score how vulnerable `target` is to `attacker`.
///
/// `target_allies` may include the target itself; it is skipped.
pub fn score(
    attacker: &GroupState,
    target: &GroupState,
    target_allies: &[GroupState],
    terrain: &dyn TerrainQuery,
) -> VulnerabilityScore {
    VulnerabilityScore {
        matchup: matchup_bonus(attacker.class, target.class),
        distance: 1.0 - (attacker.distance_to(target) / DISTANCE_NORMALIZER).min(1.0),
        isolation: isolation_factor(target, target_allies),
        terrain: terrain_factor(target, terrain),
        facing: facing_factor(attacker, target),
    }
}

/// Pick the enemy group with the highest positive score
pub fn most_vulnerable<'a>(
    attacker: &GroupState,
    enemies: &'a [GroupState],
    terrain: &dyn TerrainQuery,
) -> Option<&'a GroupState> {
    enemies
        .iter()
        .filter(|e| e.is_active())
        .map(|e| (e, score(attacker, e, enemies, terrain).total()))
        .filter(|(_, total)| *total > 0.0)
        .max_by_key(|(_, total)| OrderedFloat(*total))
        .map(|(e, _)| e)
}

fn isolation_factor(target: &GroupState, allies: &[GroupState]) -> f32 {
    let nearest = allies
        .iter()
        .filter(|a| a.id != target.id && a.is_active())
        .map(|a| a.distance_to(target))
        .min_by_key(|d| OrderedFloat(*d));
    let ratio = match nearest {
        Some(d) => (d / ISOLATION_NORMALIZER).min(1.0),
        None => 1.0,
    };
    ratio * ISOLATION_WEIGHT
}

fn terrain_factor(target: &GroupState, terrain: &dyn TerrainQuery) -> f32 {
    let here = terrain.height_at(target.ground());
    let around = terrain.average_surrounding_height(target.ground(), TERRAIN_PROBE_RADIUS);
    if here < around - TERRAIN_TOLERANCE {
        0.5
    } else if here > around + TERRAIN_TOLERANCE {
        -0.3
    } else {
        0.0
    }
}

fn facing_factor(attacker: &GroupState, target: &GroupState) -> f32 {
    let attack_dir = direction_to(attacker.ground(), target.ground());
    let alignment = target.facing.dot(attack_dir).abs();
    let mut factor = 0.0;

    if target.shape.is_line() && alignment < 0.5 {
        factor += 0.7;
    }
    if target.shape == Shape::Column && alignment > 0.7 {
        factor += 0.5;
    }
    if target.shape == Shape::SpearWall && attacker.class == UnitClass::Cavalry {
        factor -= 0.8;
    }
    if target.shape == Shape::ShieldWall && attacker.class.shoots() {
        factor -= 0.6;
    }
    factor
}
