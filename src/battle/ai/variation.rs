//! Skill-scaled randomization of priorities
//!
//! Draws come from the faction's own seeded generator in a fixed order
//! (maneuvers, responses, actions, then the unexpected roll) so a seed
//! always replays the same decisions.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::battle::ai::decisions::{Maneuver, ManeuverKind, OpportunityAction, ThreatResponse};

pub const MIN_PRIORITY: f32 = 0.1;
pub const MAX_PRIORITY: f32 = 1.0;
/// Jitter magnitude per point of skill
pub const JITTER_PER_SKILL: f32 = 0.2;
/// Chance of a surprise maneuver per point of skill
pub const UNEXPECTED_PER_SKILL: f32 = 0.3;

/// Jitter a priority by up to `magnitude` either way and clamp it
pub fn jitter<R: Rng + ?Sized>(priority: f32, magnitude: f32, rng: &mut R) -> f32 {
    let noise = if magnitude > 0.0 {
        rng.gen_range(-magnitude..=magnitude)
    } else {
        0.0
    };
    (priority + noise).clamp(MIN_PRIORITY, MAX_PRIORITY)
}

/// Apply jitter to every priority and maybe append a surprise maneuver.
///
/// The surprise maneuver carries no groups; the executor binds them.
pub fn apply<R: Rng + ?Sized>(
    maneuvers: &mut Vec<Maneuver>,
    responses: &mut [ThreatResponse],
    actions: &mut [OpportunityAction],
    skill: f32,
    allow_unexpected: bool,
    rng: &mut R,
) {
    let skill = skill.clamp(0.0, 1.0);
    let magnitude = skill * JITTER_PER_SKILL;

    for maneuver in maneuvers.iter_mut() {
        maneuver.priority = jitter(maneuver.priority, magnitude, rng);
    }
    for response in responses.iter_mut() {
        response.priority = jitter(response.priority, magnitude, rng);
    }
    for action in actions.iter_mut() {
        action.priority = jitter(action.priority, magnitude, rng);
    }

    if allow_unexpected && rng.gen::<f32>() < skill * UNEXPECTED_PER_SKILL {
        if let Some(kind) = ManeuverKind::UNEXPECTED.choose(rng) {
            let priority = rng.gen_range(0.7..=0.9);
            maneuvers.push(Maneuver::new(*kind, priority, Vec::new()));
        }
    }
}
