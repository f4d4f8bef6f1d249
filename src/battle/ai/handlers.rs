//! One handler per maneuver, response and action kind
//!
//! Each `Directive` impl is an exhaustive match, so a new kind does not
//! compile until it has a handler. Handlers re-resolve their groups from
//! the snapshot and skip anything that has gone.

use glam::Vec2;

use crate::battle::ai::decisions::{
    ActionKind, Maneuver, ManeuverKind, OpportunityAction, ResponseKind, ThreatResponse,
};
use crate::battle::ai::executor::{Directive, OrderContext};
use crate::battle::ai::placement::{envelop, flank_position};
use crate::battle::groups::{FirePolicy, GroupState, Shape, Spacing, UnitClass};
use crate::battle::vulnerability::most_vulnerable;
use crate::core::error::Result;
use crate::spatial::{direction_to, right_of, RAY_STEP};

/// Distance inside which a group charges instead of moving closer
const CHARGE_RANGE: f32 = 20.0;
/// Forward step for advancing maneuvers
const ADVANCE_STEP: f32 = 30.0;
/// Preferred shooting distance for foot archers
const VOLLEY_RANGE: f32 = 50.0;
/// Foot archers close in once farther than this
const VOLLEY_CLOSE_BEYOND: f32 = 60.0;
/// Horse archers try to hold this distance
const KITE_RANGE: f32 = 60.0;
/// Search distance toward the enemy for higher ground
const HIGH_GROUND_SEARCH: f32 = 100.0;
/// Search distance for archer firing positions
const FIRING_POSITION_SEARCH: f32 = 50.0;

/// Compass offsets used when surrounding a point
const SURROUND: [Vec2; 4] = [Vec2::X, Vec2::Y, Vec2::NEG_X, Vec2::NEG_Y];

impl Directive for Maneuver {
    fn priority(&self) -> f32 {
        self.priority
    }

    fn execute(&self, ctx: &mut OrderContext<'_>) -> Result<()> {
        let groups = bind_groups(self, ctx);
        if groups.is_empty() {
            return Ok(());
        }
        tracing::debug!(kind = ?self.kind, groups = groups.len(), "executing maneuver");

        match self.kind {
            ManeuverKind::SeekHighGround => seek_high_ground(ctx, &groups),
            ManeuverKind::FormDefensiveLine => {
                reshape_facing_enemy(ctx, &groups, Shape::Line, Spacing::Tight);
                Ok(())
            }
            ManeuverKind::PositionRangedBehindInfantry => ranged_behind_infantry(ctx, &groups),
            ManeuverKind::HoldCavalryInReserve => cavalry_reserve(ctx, &groups),
            ManeuverKind::FormShieldWall => {
                reshape_facing_enemy(ctx, &groups, Shape::ShieldWall, Spacing::Tight);
                Ok(())
            }
            ManeuverKind::FormSpearWall => {
                reshape_facing_enemy(ctx, &groups, Shape::SpearWall, Spacing::Tight);
                Ok(())
            }
            ManeuverKind::AdvanceInFormation => advance(ctx, &groups, Some(Shape::Line)),
            ManeuverKind::PositionRangedForEffectiveness => ranged_firing_positions(ctx, &groups),
            ManeuverKind::PrepareCavalryFlank => prepare_cavalry_flank(ctx, &groups),
            ManeuverKind::ExploitFlankingOpportunity => exploit_flank(ctx, self, &groups),
            ManeuverKind::FrontalAssault => frontal_assault(ctx, &groups),
            ManeuverKind::AggressiveCavalryFlank => aggressive_cavalry_flank(ctx, &groups),
            ManeuverKind::AdvanceRangedForDamage => ranged_close_in(ctx, &groups),
            ManeuverKind::Envelopment => envelop(ctx, &groups),
            ManeuverKind::CoordinatedStrike => coordinated_strike(ctx, self, &groups),
            ManeuverKind::FormWedge => advance(ctx, &groups, Some(Shape::Wedge)),
            ManeuverKind::ShockInfantryCharge => {
                for group in &groups {
                    ctx.shape(group, Shape::Line);
                    ctx.spacing(group, Spacing::Loose);
                    ctx.charge(group);
                }
                Ok(())
            }
            ManeuverKind::HeavyCavalryCharge => heavy_cavalry_charge(ctx, &groups),
            ManeuverKind::MountedArcherHarassment => harass(ctx, &groups),
            ManeuverKind::MultiDirectionalAmbush => ambush_from_all_sides(ctx, &groups),
            ManeuverKind::ForestArcherTactics => forest_archers(ctx, &groups),
            ManeuverKind::FeignedRetreat => feigned_retreat(ctx, &groups),
            ManeuverKind::SuddenFormationChange => {
                sudden_formation_change(ctx, &groups);
                Ok(())
            }
            ManeuverKind::HiddenReserveDeployment => hidden_reserve(ctx, &groups),
            ManeuverKind::Distraction => distraction(ctx, &groups),
            ManeuverKind::FalseFlanking => false_flanking(ctx, &groups),
        }
    }
}

/// Resolve the maneuver's groups, binding unexpected maneuvers that were
/// proposed without any.
fn bind_groups<'a>(maneuver: &Maneuver, ctx: &OrderContext<'a>) -> Vec<&'a GroupState> {
    if !maneuver.groups.is_empty() {
        return ctx.own_groups(&maneuver.groups);
    }
    let all = || ctx.own_groups(&ctx.snapshot().all_own_ids());
    let first_present = |classes: &[UnitClass]| {
        classes
            .iter()
            .map(|c| ctx.own_of(*c))
            .find(|g| !g.is_empty())
            .unwrap_or_default()
    };
    match maneuver.kind {
        ManeuverKind::FeignedRetreat | ManeuverKind::Distraction => all(),
        ManeuverKind::SuddenFormationChange => ctx.own_of(UnitClass::Infantry),
        ManeuverKind::HiddenReserveDeployment => {
            first_present(&[UnitClass::Cavalry, UnitClass::Infantry])
        }
        ManeuverKind::FalseFlanking => {
            let mounted: Vec<&GroupState> = all()
                .into_iter()
                .filter(|g| g.class.is_mounted())
                .collect();
            if mounted.is_empty() {
                ctx.own_of(UnitClass::Infantry)
            } else {
                mounted
            }
        }
        _ => Vec::new(),
    }
}

fn facing_enemy(ctx: &OrderContext<'_>, group: &GroupState) -> Vec2 {
    match ctx.enemy_center() {
        Some(center) => direction_to(group.ground(), center),
        None => group.facing,
    }
}

fn reshape_facing_enemy(ctx: &mut OrderContext<'_>, groups: &[&GroupState], shape: Shape, spacing: Spacing) {
    for group in groups {
        ctx.shape(group, shape);
        ctx.spacing(group, spacing);
        let dir = facing_enemy(ctx, group);
        ctx.face(group, dir);
    }
}

fn seek_high_ground(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let (Some(own_center), Some(front)) = (ctx.own_center(), ctx.front()) else {
        return Ok(());
    };
    let hill = ctx
        .terrain()
        .highest_point_along(own_center, front, HIGH_GROUND_SEARCH, RAY_STEP)
        .truncate();
    // Keep the army's shape while shifting it onto the hill
    for group in groups {
        ctx.move_to(group, hill + (group.ground() - own_center))?;
        ctx.face(group, front);
    }
    Ok(())
}

fn ranged_behind_infantry(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let Some(infantry) = ctx.snapshot().main_group(UnitClass::Infantry) else {
        return Ok(());
    };
    let dir = infantry.facing.normalize_or_zero();
    for group in groups {
        let slot = infantry.ground() - dir * (infantry.depth + group.depth) * 0.7;
        ctx.move_to(group, slot)?;
        ctx.face(group, dir);
        ctx.shape(group, Shape::Line);
        ctx.fire(group, FirePolicy::FireAtWill);
    }
    Ok(())
}

fn cavalry_reserve(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let Some(infantry) = ctx.snapshot().main_group(UnitClass::Infantry) else {
        return Ok(());
    };
    let dir = infantry.facing.normalize_or_zero();
    let slot = infantry.ground() - dir * infantry.depth * 1.5 + right_of(dir) * infantry.width * 0.8;
    for group in groups {
        ctx.move_to(group, slot)?;
        ctx.face(group, dir);
        ctx.shape(group, Shape::Column);
    }
    Ok(())
}

fn advance(ctx: &mut OrderContext<'_>, groups: &[&GroupState], shape: Option<Shape>) -> Result<()> {
    for group in groups {
        let dir = facing_enemy(ctx, group);
        if let Some(shape) = shape {
            ctx.shape(group, shape);
        }
        ctx.move_to(group, group.ground() + dir * ADVANCE_STEP)?;
        ctx.face(group, dir);
    }
    Ok(())
}

fn ranged_firing_positions(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        let dir = facing_enemy(ctx, group);
        let spot = ctx
            .terrain()
            .highest_point_along(group.ground(), dir, FIRING_POSITION_SEARCH, RAY_STEP)
            .truncate();
        ctx.move_to(group, spot)?;
        ctx.face(group, dir);
        ctx.fire(group, FirePolicy::FireAtWill);
    }
    Ok(())
}

fn prepare_cavalry_flank(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let Some(infantry) = ctx.snapshot().main_group(UnitClass::Infantry) else {
        return Ok(());
    };
    let dir = infantry.facing.normalize_or_zero();
    for group in groups {
        let slot = infantry.ground() + right_of(dir) * (infantry.width + group.width) * 0.7;
        ctx.shape(group, Shape::Line);
        ctx.move_to(group, slot)?;
        ctx.face(group, dir);
    }
    Ok(())
}

fn exploit_flank(ctx: &mut OrderContext<'_>, maneuver: &Maneuver, groups: &[&GroupState]) -> Result<()> {
    let target = maneuver.target_group.and_then(|id| ctx.enemy(id));
    let point = match (target, maneuver.side) {
        (Some(target), Some(side)) => flank_position(target, side),
        (Some(target), None) => target.ground(),
        (None, _) => match maneuver.target_position {
            Some(point) => point,
            None => return Ok(()),
        },
    };
    let aim = target.map_or(point, |t| t.ground());
    for group in groups {
        ctx.close_and_charge(group, point, CHARGE_RANGE)?;
        ctx.face_point(group, aim);
    }
    Ok(())
}

fn frontal_assault(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        let Some(enemy) = ctx.nearest_enemy(group.ground()) else {
            continue;
        };
        ctx.shape(group, Shape::Line);
        ctx.move_to(group, enemy.ground())?;
        ctx.charge(group);
    }
    Ok(())
}

fn aggressive_cavalry_flank(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let enemies = &ctx.snapshot().enemy_groups;
    for group in groups {
        let Some(target) = most_vulnerable(group, enemies, ctx.terrain()) else {
            continue;
        };
        let point = target.ground() + right_of(target.facing.normalize_or_zero()) * target.width * 0.8;
        ctx.close_and_charge(group, point, CHARGE_RANGE)?;
    }
    Ok(())
}

fn ranged_close_in(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        let Some(enemy) = ctx.nearest_enemy(group.ground()) else {
            continue;
        };
        let dir = direction_to(group.ground(), enemy.ground());
        if group.distance_to(enemy) > VOLLEY_CLOSE_BEYOND {
            ctx.move_to(group, enemy.ground() - dir * VOLLEY_RANGE)?;
        }
        ctx.face(group, dir);
        ctx.fire(group, FirePolicy::FireAtWill);
    }
    Ok(())
}

fn coordinated_strike(ctx: &mut OrderContext<'_>, maneuver: &Maneuver, groups: &[&GroupState]) -> Result<()> {
    let target = maneuver
        .target_group
        .and_then(|id| ctx.enemy(id))
        .map(|g| g.ground())
        .or(maneuver.target_position);
    let Some(target) = target else {
        return Ok(());
    };
    for group in groups {
        if group.class.is_mounted() {
            let dir = direction_to(group.ground(), target);
            ctx.close_and_charge(group, target + right_of(dir) * 40.0, CHARGE_RANGE)?;
        } else {
            ctx.move_to(group, target)?;
            ctx.charge(group);
        }
    }
    Ok(())
}

fn heavy_cavalry_charge(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let enemies = &ctx.snapshot().enemy_groups;
    for group in groups {
        ctx.shape(group, Shape::Wedge);
        if let Some(target) = most_vulnerable(group, enemies, ctx.terrain()) {
            ctx.move_to(group, target.ground())?;
        }
        ctx.charge(group);
    }
    Ok(())
}

fn harass(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        ctx.shape(group, Shape::Scatter);
        ctx.spacing(group, Spacing::VeryLoose);
        ctx.fire(group, FirePolicy::FireAtWill);
        let Some(enemy) = ctx.nearest_enemy(group.ground()) else {
            continue;
        };
        let dir = direction_to(group.ground(), enemy.ground());
        let distance = group.distance_to(enemy);
        if distance < KITE_RANGE * 0.8 || distance > KITE_RANGE * 1.2 {
            ctx.move_to(group, enemy.ground() - dir * KITE_RANGE)?;
        } else {
            // In range: slide sideways and keep shooting
            ctx.move_to(group, group.ground() + right_of(dir) * 20.0)?;
        }
        ctx.face(group, dir);
    }
    Ok(())
}

fn ambush_from_all_sides(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    if groups.len() < 2 {
        return Ok(());
    }
    let center = ctx.enemy_center();
    surround(ctx, groups, center, 60.0)
}

fn surround(ctx: &mut OrderContext<'_>, groups: &[&GroupState], center: Option<Vec2>, radius: f32) -> Result<()> {
    let Some(center) = center else {
        return Ok(());
    };
    for (group, offset) in groups.iter().zip(SURROUND.iter().cycle()) {
        ctx.move_to(group, center + *offset * radius)?;
        ctx.face_point(group, center);
    }
    Ok(())
}

fn forest_archers(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        let dir = facing_enemy(ctx, group);
        ctx.move_to(group, group.ground() - dir * 30.0)?;
        ctx.shape(group, Shape::Scatter);
        ctx.spacing(group, Spacing::Loose);
        ctx.fire(group, FirePolicy::FireAtWill);
        ctx.face(group, dir);
    }
    Ok(())
}

fn feigned_retreat(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        let dir = facing_enemy(ctx, group);
        ctx.move_to(group, group.ground() - dir * 50.0)?;
        ctx.face(group, dir);
    }
    Ok(())
}

fn sudden_formation_change(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) {
    for group in groups {
        let shape = match group.shape {
            Shape::Line => Shape::Wedge,
            Shape::Column => Shape::Line,
            _ => Shape::Column,
        };
        let spacing = if group.spacing.multiplier() < 1.0 {
            Spacing::Loose
        } else {
            Spacing::Tight
        };
        ctx.shape(group, shape);
        ctx.spacing(group, spacing);
    }
}

fn hidden_reserve(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let (Some(enemy_center), Some(front)) = (ctx.enemy_center(), ctx.front()) else {
        return Ok(());
    };
    let point = enemy_center + right_of(front) * 40.0;
    for group in groups {
        ctx.close_and_charge(group, point, CHARGE_RANGE)?;
        ctx.face_point(group, enemy_center);
    }
    Ok(())
}

fn distraction(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    if groups.len() < 2 {
        return Ok(());
    }
    let (Some(enemy_center), Some(front)) = (ctx.enemy_center(), ctx.front()) else {
        return Ok(());
    };
    let Some(bait) = groups.iter().min_by_key(|g| g.count) else {
        return Ok(());
    };
    ctx.charge(bait);
    let swing = enemy_center + right_of(front) * 50.0;
    for group in groups.iter().filter(|g| g.id != bait.id) {
        ctx.move_to(group, swing)?;
        ctx.face_point(group, enemy_center);
    }
    Ok(())
}

fn false_flanking(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    for group in groups {
        let dir = facing_enemy(ctx, group);
        ctx.move_to(group, group.ground() + right_of(dir) * 30.0)?;
        ctx.face(group, dir);
    }
    Ok(())
}

impl Directive for ThreatResponse {
    fn priority(&self) -> f32 {
        self.priority
    }

    fn execute(&self, ctx: &mut OrderContext<'_>) -> Result<()> {
        let threat = &self.threat;
        tracing::debug!(kind = ?self.kind, threat = ?threat.kind, "executing response");

        for group in ctx.own_groups(&self.groups) {
            let toward = direction_to(group.ground(), threat.position);
            match self.kind {
                ResponseKind::AntiCavalryBrace => {
                    ctx.shape(group, Shape::SpearWall);
                    ctx.spacing(group, Spacing::Tight);
                    ctx.face(group, toward);
                }
                ResponseKind::DefensiveSquare => {
                    ctx.shape(group, Shape::Square);
                    ctx.spacing(group, Spacing::Tight);
                }
                ResponseKind::RaiseShields => {
                    ctx.shape(group, Shape::ShieldWall);
                    ctx.face(group, toward);
                }
                ResponseKind::ChargeCavalryAtRanged => {
                    ctx.shape(group, Shape::Line);
                    ctx.move_to(group, threat.position)?;
                    ctx.charge(group);
                }
                ResponseKind::AdvanceQuickly => {
                    ctx.move_to(group, group.ground() + toward * ADVANCE_STEP)?;
                    ctx.speed(group, 2.0);
                }
                ResponseKind::FlankWithCavalry => {
                    let point = threat.position + right_of(threat.direction) * 40.0;
                    ctx.close_and_charge(group, point, CHARGE_RANGE)?;
                }
                ResponseKind::ConcentrateRangedFire => {
                    ctx.shape(group, Shape::Line);
                    ctx.fire(group, FirePolicy::FireAtWill);
                    if group.ground().distance(threat.position) > VOLLEY_CLOSE_BEYOND {
                        ctx.move_to(group, threat.position - toward * VOLLEY_RANGE)?;
                    }
                    ctx.face(group, toward);
                }
                ResponseKind::FormDefensiveLine => {
                    ctx.shape(group, Shape::Line);
                    ctx.spacing(group, Spacing::Tight);
                    ctx.face(group, toward);
                }
                ResponseKind::DefensiveCircle => {
                    ctx.shape(group, Shape::Circle);
                    ctx.spacing(group, Spacing::Tight);
                }
                ResponseKind::ReformAndRegroup => {
                    if let Some(center) = ctx.own_center() {
                        ctx.move_to(group, center)?;
                    }
                    ctx.face(group, toward);
                }
            }
        }
        Ok(())
    }
}

impl Directive for OpportunityAction {
    fn priority(&self) -> f32 {
        self.priority
    }

    fn execute(&self, ctx: &mut OrderContext<'_>) -> Result<()> {
        let opportunity = &self.opportunity;
        let groups = ctx.own_groups(&self.groups);
        let target = opportunity
            .target
            .and_then(|id| ctx.enemy(id))
            .map_or(opportunity.position, |g| g.ground());
        tracing::debug!(kind = ?self.kind, opportunity = ?opportunity.kind, "executing action");

        match self.kind {
            ActionKind::StrikeVulnerableRanged => {
                for group in &groups {
                    let shape = if group.class.is_mounted() { Shape::Line } else { Shape::Wedge };
                    ctx.shape(group, shape);
                    ctx.move_to(group, target)?;
                    ctx.charge(group);
                }
            }
            ActionKind::SurroundIsolated => {
                if groups.len() >= 2 {
                    surround(ctx, &groups, Some(target), 30.0)?;
                }
            }
            ActionKind::OccupyPosition => {
                for group in &groups {
                    ctx.move_to(group, opportunity.position)?;
                    match group.class {
                        UnitClass::Ranged | UnitClass::MountedRanged => {
                            ctx.fire(group, FirePolicy::FireAtWill)
                        }
                        UnitClass::Infantry => ctx.shape(group, Shape::Line),
                        UnitClass::Cavalry => {}
                    }
                    let dir = facing_enemy(ctx, group);
                    ctx.face(group, dir);
                }
            }
            ActionKind::ExploitDivision => {
                for group in &groups {
                    let shape = if group.class == UnitClass::Cavalry { Shape::Wedge } else { Shape::Line };
                    ctx.shape(group, shape);
                    ctx.close_and_charge(group, target, CHARGE_RANGE)?;
                }
            }
            ActionKind::CounterCharge => {
                for group in &groups {
                    match group.class {
                        UnitClass::Cavalry => ctx.shape(group, Shape::Wedge),
                        UnitClass::Infantry => ctx.shape(group, Shape::Line),
                        _ => {}
                    }
                    ctx.face_point(group, target);
                    ctx.charge(group);
                }
            }
        }
        Ok(())
    }
}
