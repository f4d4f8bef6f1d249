//! Posture maneuver menus and faction signature maneuvers
//!
//! Base priorities are fixed per maneuver. The menus only propose; the
//! policy truncates to the top three before variation.

use ordered_float::OrderedFloat;

use crate::battle::ai::decisions::{Maneuver, ManeuverKind, Posture};
use crate::battle::ai::faction_tactics::{FactionTacticTable, Requirement};
use crate::battle::evaluator::Assessment;
use crate::battle::groups::UnitClass;
use crate::battle::opportunity::{Opportunity, OpportunityKind};
use crate::battle::snapshot::Snapshot;
use crate::core::types::GroupId;
use crate::spatial::flank_side;

/// Maneuvers kept after truncation (variation may add one more)
pub const MAX_MANEUVERS: usize = 3;
/// Terrain advantage below which defenders look for higher ground
pub const HIGH_GROUND_WANTED_BELOW: f32 = 0.6;

/// Switches and thresholds the menus depend on
#[derive(Debug, Clone, Copy)]
pub struct MenuOptions {
    pub advanced: bool,
    pub envelopment_min_strength: u32,
}

/// Maneuvers proposed for a posture, before faction additions
pub fn posture_menu(
    posture: Posture,
    snapshot: &Snapshot,
    assessment: &Assessment,
    options: MenuOptions,
) -> Vec<Maneuver> {
    match posture {
        Posture::Defensive => defensive(snapshot, assessment),
        Posture::Balanced => balanced(snapshot, options),
        Posture::Offensive => offensive(snapshot, options),
    }
}

/// Push a maneuver only when it has groups to carry it out
fn propose(menu: &mut Vec<Maneuver>, kind: ManeuverKind, priority: f32, groups: Vec<GroupId>) {
    if !groups.is_empty() {
        menu.push(Maneuver::new(kind, priority, groups));
    }
}

fn defensive(snapshot: &Snapshot, assessment: &Assessment) -> Vec<Maneuver> {
    let mut menu = Vec::new();
    let infantry = snapshot.own_ids(UnitClass::Infantry);

    if assessment.terrain_advantage < HIGH_GROUND_WANTED_BELOW {
        propose(&mut menu, ManeuverKind::SeekHighGround, 0.9, snapshot.all_own_ids());
    }
    propose(&mut menu, ManeuverKind::FormDefensiveLine, 0.85, infantry.clone());
    propose(
        &mut menu,
        ManeuverKind::PositionRangedBehindInfantry,
        0.8,
        snapshot.own_ids(UnitClass::Ranged),
    );
    propose(
        &mut menu,
        ManeuverKind::HoldCavalryInReserve,
        0.75,
        snapshot.own_ids(UnitClass::Cavalry),
    );
    if snapshot.infantry_has_shields() {
        propose(&mut menu, ManeuverKind::FormShieldWall, 0.7, infantry);
    } else if snapshot.infantry_has_spears() {
        propose(&mut menu, ManeuverKind::FormSpearWall, 0.7, infantry);
    }
    menu
}

fn balanced(snapshot: &Snapshot, options: MenuOptions) -> Vec<Maneuver> {
    let mut menu = Vec::new();
    propose(
        &mut menu,
        ManeuverKind::AdvanceInFormation,
        0.8,
        snapshot.own_ids(UnitClass::Infantry),
    );
    propose(
        &mut menu,
        ManeuverKind::PositionRangedForEffectiveness,
        0.75,
        snapshot.own_ids(UnitClass::Ranged),
    );
    propose(
        &mut menu,
        ManeuverKind::PrepareCavalryFlank,
        0.7,
        snapshot.own_ids(UnitClass::Cavalry),
    );

    if options.advanced {
        if let Some(maneuver) = exploit_best_flank(snapshot) {
            menu.push(maneuver);
        }
    }
    menu
}

fn exploit_best_flank(snapshot: &Snapshot) -> Option<Maneuver> {
    let best = best_opportunity(snapshot, |k| k == OpportunityKind::Flanking)?;
    let groups = flanking_groups(snapshot);
    if groups.is_empty() {
        return None;
    }

    let mut maneuver = Maneuver::new(ManeuverKind::ExploitFlankingOpportunity, 0.85, groups);
    let target = best.target.and_then(|id| {
        snapshot.enemy_groups.iter().find(|g| g.id == id)
    });
    match (target, snapshot.own_centroid()) {
        (Some(target), Some(own_center)) => {
            let side = flank_side(target.ground(), target.facing, own_center);
            maneuver = maneuver.aimed_at(target.ground(), Some(target.id)).on_side(side);
        }
        _ => maneuver = maneuver.aimed_at(best.position, best.target),
    }
    Some(maneuver)
}

fn offensive(snapshot: &Snapshot, options: MenuOptions) -> Vec<Maneuver> {
    let mut menu = Vec::new();
    propose(
        &mut menu,
        ManeuverKind::FrontalAssault,
        0.8,
        snapshot.own_ids(UnitClass::Infantry),
    );
    propose(
        &mut menu,
        ManeuverKind::AggressiveCavalryFlank,
        0.9,
        snapshot.own_ids(UnitClass::Cavalry),
    );
    propose(
        &mut menu,
        ManeuverKind::AdvanceRangedForDamage,
        0.75,
        snapshot.own_ids(UnitClass::Ranged),
    );

    if options.advanced {
        if snapshot.own_strength() > options.envelopment_min_strength {
            propose(&mut menu, ManeuverKind::Envelopment, 0.85, snapshot.all_own_ids());
        }

        let strike_target = best_opportunity(snapshot, |k| {
            matches!(k, OpportunityKind::VulnerableRanged | OpportunityKind::IsolatedFormation)
        });
        if let Some(opportunity) = strike_target {
            let groups = strike_groups(snapshot);
            if !groups.is_empty() {
                menu.push(
                    Maneuver::new(ManeuverKind::CoordinatedStrike, 0.95, groups)
                        .aimed_at(opportunity.position, opportunity.target),
                );
            }
        }
    }
    menu
}

/// Signature maneuver from the faction table, if its requirement holds
pub fn faction_signature(snapshot: &Snapshot, table: &FactionTacticTable) -> Option<Maneuver> {
    let signature = table.lookup(&snapshot.key)?.maneuver?;
    let groups = match signature.requirement {
        Requirement::Units { class, min_count } => {
            if snapshot.own_count(class) < min_count {
                return None;
            }
            snapshot.own_ids(class)
        }
        Requirement::TerrainDifficulty { min } => {
            if snapshot.terrain_difficulty <= min {
                return None;
            }
            snapshot.all_own_ids()
        }
    };
    if groups.is_empty() {
        return None;
    }
    Some(Maneuver::new(signature.kind, signature.priority, groups))
}

/// Sort by descending priority (stable) and keep the top entries
pub fn truncate_by_priority(maneuvers: &mut Vec<Maneuver>, keep: usize) {
    maneuvers.sort_by_key(|m| std::cmp::Reverse(OrderedFloat(m.priority)));
    maneuvers.truncate(keep);
}

fn best_opportunity(
    snapshot: &Snapshot,
    wanted: impl Fn(OpportunityKind) -> bool,
) -> Option<&Opportunity> {
    snapshot
        .opportunities
        .iter()
        .filter(|o| wanted(o.kind) && o.value() > 0.0)
        .max_by_key(|o| OrderedFloat(o.value()))
}

/// Cavalry if there are at least 5, else mounted archers, else a solid
/// block of infantry
fn flanking_groups(snapshot: &Snapshot) -> Vec<GroupId> {
    if snapshot.own_count(UnitClass::Cavalry) >= 5 {
        snapshot.own_ids(UnitClass::Cavalry)
    } else if snapshot.own_count(UnitClass::MountedRanged) >= 5 {
        snapshot.own_ids(UnitClass::MountedRanged)
    } else if snapshot.own_count(UnitClass::Infantry) >= 10 {
        snapshot.own_ids(UnitClass::Infantry)
    } else {
        Vec::new()
    }
}

/// Cavalry (5+) and infantry (10+) strike together
fn strike_groups(snapshot: &Snapshot) -> Vec<GroupId> {
    let mut groups = Vec::new();
    if snapshot.own_count(UnitClass::Cavalry) >= 5 {
        groups.extend(snapshot.own_ids(UnitClass::Cavalry));
    }
    if snapshot.own_count(UnitClass::Infantry) >= 10 {
        groups.extend(snapshot.own_ids(UnitClass::Infantry));
    }
    groups
}
