//! Placement geometry: formation slots around the main infantry body,
//! flank positions and the envelopment split

use glam::Vec2;
use std::collections::BTreeMap;

use crate::battle::ai::decisions::{FormationAdjustment, RelativePlacement};
use crate::battle::ai::executor::OrderContext;
use crate::battle::groups::{GroupState, UnitClass};
use crate::core::error::Result;
use crate::spatial::{flank_vector, left_of, right_of, FlankSide};

/// Flank position offset as a share of the target's frontage
pub const FLANK_WIDTH_SHARE: f32 = 0.8;
/// How far the envelopment center holds short of the enemy centroid
pub const ENVELOPMENT_CENTER_STANDOFF: f32 = 30.0;
/// Sideways reach of the envelopment wings
pub const ENVELOPMENT_WING_REACH: f32 = 50.0;

/// Where a flanking group should stand to hit `target` on `side`
pub fn flank_position(target: &GroupState, side: FlankSide) -> Vec2 {
    target.ground() + flank_vector(target.facing, side) * target.width * FLANK_WIDTH_SHARE
}

/// Slot for `group` relative to the main infantry body, `None` for center
pub fn relative_position(
    placement: RelativePlacement,
    infantry: &GroupState,
    group: &GroupState,
) -> Option<Vec2> {
    let anchor = infantry.ground();
    let dir = infantry.facing.normalize_or_zero();
    let right = right_of(dir);
    let left = left_of(dir);
    let side_gap = infantry.width + group.width;
    let rear_gap = infantry.depth + group.depth;

    let offset = match placement {
        RelativePlacement::Center => return None,
        RelativePlacement::Flank => right * side_gap * 0.6,
        RelativePlacement::AdvancedFlank => right * side_gap * 0.6 + dir * infantry.depth * 0.5,
        RelativePlacement::ProtectedFlank => left * side_gap * 0.6 - dir * infantry.depth * 0.3,
        RelativePlacement::FarFlank => right * side_gap * 1.2,
        RelativePlacement::BehindCenter => -dir * rear_gap * 0.7,
        RelativePlacement::BehindFlank => right * infantry.width * 0.7 - dir * rear_gap * 0.7,
    };
    Some(anchor + offset)
}

/// Set shape, spacing and depth for every class, then move non-infantry
/// groups into their slot around the largest infantry group.
pub fn apply_formations(
    ctx: &mut OrderContext<'_>,
    formations: &BTreeMap<UnitClass, FormationAdjustment>,
) -> Result<()> {
    let anchor = ctx.snapshot().main_group(UnitClass::Infantry);

    for (class, adjustment) in formations {
        for group in ctx.own_of(*class) {
            ctx.shape(group, adjustment.shape);
            ctx.spacing(group, adjustment.spacing);
            ctx.width(group, group.count / adjustment.depth.max(1));

            let Some(infantry) = anchor else { continue };
            if group.id == infantry.id {
                continue;
            }
            if let Some(slot) = relative_position(adjustment.placement, infantry, group) {
                ctx.move_to(group, slot)?;
                ctx.face(group, infantry.facing);
            }
        }
    }
    Ok(())
}

/// Groups split into the three envelopment buckets
#[derive(Debug, Default)]
pub struct EnvelopmentSplit<'a> {
    pub center: Vec<&'a GroupState>,
    pub left: Vec<&'a GroupState>,
    pub right: Vec<&'a GroupState>,
}

/// Foot troops hold the center; horse fill the wings, cavalry leaning
/// right and horse archers leaning left, whichever wing is shorter.
pub fn split_for_envelopment<'a>(groups: &[&'a GroupState]) -> EnvelopmentSplit<'a> {
    let mut split = EnvelopmentSplit::default();
    for &group in groups {
        match group.class {
            UnitClass::Infantry | UnitClass::Ranged => split.center.push(group),
            UnitClass::Cavalry => {
                if split.right.len() <= split.left.len() {
                    split.right.push(group);
                } else {
                    split.left.push(group);
                }
            }
            UnitClass::MountedRanged => {
                if split.left.len() <= split.right.len() {
                    split.left.push(group);
                } else {
                    split.right.push(group);
                }
            }
        }
    }
    split
}

/// Convergent envelopment: center closes frontally, wings swing out to
/// either side of the enemy centroid and turn inward.
pub fn envelop(ctx: &mut OrderContext<'_>, groups: &[&GroupState]) -> Result<()> {
    let (Some(enemy_center), Some(front)) = (ctx.enemy_center(), ctx.front()) else {
        return Ok(());
    };
    let split = split_for_envelopment(groups);

    let center_point = enemy_center - front * ENVELOPMENT_CENTER_STANDOFF;
    for group in split.center {
        ctx.move_to(group, center_point)?;
        ctx.face(group, front);
    }
    for (wing, side) in [(split.left, left_of(front)), (split.right, right_of(front))] {
        let point = enemy_center + side * ENVELOPMENT_WING_REACH;
        for group in wing {
            ctx.move_to(group, point)?;
            ctx.face_point(group, enemy_center);
        }
    }
    Ok(())
}
