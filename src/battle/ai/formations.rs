//! Formation adjustments and target-priority tables per unit class

use std::collections::BTreeMap;

use crate::battle::ai::decisions::{FormationAdjustment, Posture, RelativePlacement, TargetPriority};
use crate::battle::ai::faction_tactics::InfantryStyle;
use crate::battle::evaluator::Assessment;
use crate::battle::groups::{Shape, Spacing, UnitClass};
use crate::battle::snapshot::Snapshot;

/// Terrain advantage above which archers shift to a flank
const ARCHERS_TO_FLANK_ABOVE: f32 = 0.7;

/// Adjustment for every class the faction currently fields
pub fn formation_adjustments(
    posture: Posture,
    snapshot: &Snapshot,
    assessment: &Assessment,
    offensive_infantry: Option<InfantryStyle>,
) -> BTreeMap<UnitClass, FormationAdjustment> {
    UnitClass::ALL
        .into_iter()
        .filter_map(|class| {
            let count = snapshot.own_count(class);
            if count == 0 {
                return None;
            }
            let adjustment = match class {
                UnitClass::Infantry => infantry(posture, snapshot, count, offensive_infantry),
                UnitClass::Ranged => ranged(posture, assessment, count),
                UnitClass::Cavalry => cavalry(posture),
                UnitClass::MountedRanged => mounted_ranged(posture),
            };
            Some((class, adjustment))
        })
        .collect()
}

fn infantry(
    posture: Posture,
    snapshot: &Snapshot,
    count: u32,
    offensive_style: Option<InfantryStyle>,
) -> FormationAdjustment {
    let (shape, spacing) = match posture {
        Posture::Defensive if snapshot.infantry_has_shields() => (Shape::ShieldWall, Spacing::Tight),
        Posture::Defensive if snapshot.infantry_has_spears() => (Shape::SpearWall, Spacing::Tight),
        Posture::Defensive => (Shape::Line, Spacing::Tight),
        Posture::Balanced => (Shape::Line, Spacing::Normal),
        Posture::Offensive => offensive_style
            .map(|s| (s.shape, s.spacing))
            .unwrap_or((Shape::Line, Spacing::Normal)),
    };
    let depth = if count > 40 {
        4
    } else if count > 20 {
        3
    } else {
        2
    };
    FormationAdjustment {
        shape,
        spacing,
        depth,
        placement: RelativePlacement::Center,
    }
}

fn ranged(posture: Posture, assessment: &Assessment, count: u32) -> FormationAdjustment {
    let placement = if posture == Posture::Defensive {
        RelativePlacement::BehindCenter
    } else if assessment.terrain_advantage > ARCHERS_TO_FLANK_ABOVE {
        RelativePlacement::BehindFlank
    } else {
        RelativePlacement::BehindCenter
    };
    FormationAdjustment {
        shape: Shape::Line,
        spacing: Spacing::Loose,
        depth: if count > 30 { 3 } else { 2 },
        placement,
    }
}

fn cavalry(posture: Posture) -> FormationAdjustment {
    let (shape, spacing, placement) = match posture {
        Posture::Defensive => (Shape::Column, Spacing::Normal, RelativePlacement::ProtectedFlank),
        Posture::Balanced => (Shape::Line, Spacing::Normal, RelativePlacement::Flank),
        Posture::Offensive => (Shape::Wedge, Spacing::Loose, RelativePlacement::AdvancedFlank),
    };
    FormationAdjustment {
        shape,
        spacing,
        depth: 2,
        placement,
    }
}

fn mounted_ranged(posture: Posture) -> FormationAdjustment {
    FormationAdjustment {
        shape: Shape::Scatter,
        spacing: Spacing::VeryLoose,
        depth: 1,
        placement: if posture == Posture::Defensive {
            RelativePlacement::ProtectedFlank
        } else {
            RelativePlacement::FarFlank
        },
    }
}

/// Static preference table: how much `attacker` wants to engage each class
pub fn target_table(attacker: UnitClass) -> Vec<TargetPriority> {
    use UnitClass::*;
    let ranked: [(UnitClass, f32); 4] = match attacker {
        Infantry => [(Infantry, 1.0), (Ranged, 0.9), (Cavalry, 0.7), (MountedRanged, 0.5)],
        Ranged => [(Ranged, 1.0), (Cavalry, 0.9), (Infantry, 0.8), (MountedRanged, 0.7)],
        Cavalry => [(Ranged, 1.0), (Infantry, 0.8), (Cavalry, 0.7), (MountedRanged, 0.6)],
        MountedRanged => [(Infantry, 1.0), (Ranged, 0.9), (Cavalry, 0.7), (MountedRanged, 0.5)],
    };
    ranked
        .into_iter()
        .map(|(class, weight)| TargetPriority { class, weight })
        .collect()
}

/// Target tables for every class the faction fields
pub fn target_priorities(snapshot: &Snapshot) -> BTreeMap<UnitClass, Vec<TargetPriority>> {
    UnitClass::ALL
        .into_iter()
        .filter(|class| snapshot.own_count(*class) > 0)
        .map(|class| (class, target_table(class)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::groups::GroupState;
    use crate::battle::snapshot::SnapshotBuilder;
    use crate::core::types::FactionId;
    use crate::spatial::FlatTerrain;
    use glam::{Vec2, Vec3};

    fn snapshot(groups: Vec<GroupState>) -> Snapshot {
        SnapshotBuilder::new(FactionId(1))
            .own_groups(groups)
            .build(&FlatTerrain::default())
    }

    fn group(class: UnitClass, count: u32) -> GroupState {
        GroupState::new(FactionId(1), class, count, Vec3::ZERO, Vec2::X)
    }

    #[test]
    fn test_infantry_depth_scales_with_count() {
        let assessment = Assessment::fixed(0.5, 0.5);
        for (count, depth) in [(15, 2), (20, 2), (21, 3), (40, 3), (41, 4)] {
            let snap = snapshot(vec![group(UnitClass::Infantry, count)]);
            let map = formation_adjustments(Posture::Balanced, &snap, &assessment, None);
            assert_eq!(map[&UnitClass::Infantry].depth, depth, "count {count}");
        }
    }

    #[test]
    fn test_defensive_infantry_walls() {
        let assessment = Assessment::fixed(0.3, 0.4);
        let shields = snapshot(vec![group(UnitClass::Infantry, 30).with_shields()]);
        let map = formation_adjustments(Posture::Defensive, &shields, &assessment, None);
        assert_eq!(map[&UnitClass::Infantry].shape, Shape::ShieldWall);
        assert_eq!(map[&UnitClass::Infantry].spacing, Spacing::Tight);

        let spears = snapshot(vec![group(UnitClass::Infantry, 30).with_spears()]);
        let map = formation_adjustments(Posture::Defensive, &spears, &assessment, None);
        assert_eq!(map[&UnitClass::Infantry].shape, Shape::SpearWall);
    }

    #[test]
    fn test_offensive_infantry_uses_faction_style() {
        let snap = snapshot(vec![group(UnitClass::Infantry, 30)]);
        let wedge = InfantryStyle {
            shape: Shape::Wedge,
            spacing: Spacing::Normal,
        };
        let assessment = Assessment::fixed(0.8, 0.5);
        let map = formation_adjustments(Posture::Offensive, &snap, &assessment, Some(wedge));
        assert_eq!(map[&UnitClass::Infantry].shape, Shape::Wedge);
        let plain = formation_adjustments(Posture::Offensive, &snap, &assessment, None);
        assert_eq!(plain[&UnitClass::Infantry].shape, Shape::Line);
    }

    #[test]
    fn test_cavalry_always_shallow() {
        let snap = snapshot(vec![group(UnitClass::Cavalry, 60)]);
        let assessment = Assessment::fixed(0.5, 0.5);
        let expected = [
            (Posture::Defensive, Shape::Column, RelativePlacement::ProtectedFlank),
            (Posture::Balanced, Shape::Line, RelativePlacement::Flank),
            (Posture::Offensive, Shape::Wedge, RelativePlacement::AdvancedFlank),
        ];
        for (posture, shape, placement) in expected {
            let map = formation_adjustments(posture, &snap, &assessment, None);
            let cavalry = map[&UnitClass::Cavalry];
            assert_eq!(cavalry.depth, 2);
            assert_eq!(cavalry.shape, shape);
            assert_eq!(cavalry.placement, placement);
        }
    }

    #[test]
    fn test_archers_shift_on_high_ground() {
        let snap = snapshot(vec![group(UnitClass::Ranged, 35)]);
        let map = formation_adjustments(Posture::Balanced, &snap, &Assessment::fixed(0.5, 0.8), None);
        assert_eq!(map[&UnitClass::Ranged].placement, RelativePlacement::BehindFlank);
        assert_eq!(map[&UnitClass::Ranged].depth, 3);
        let map = formation_adjustments(Posture::Defensive, &snap, &Assessment::fixed(0.3, 0.8), None);
        assert_eq!(map[&UnitClass::Ranged].placement, RelativePlacement::BehindCenter);
    }

    #[test]
    fn test_absent_classes_omitted() {
        let snap = snapshot(vec![group(UnitClass::Infantry, 30)]);
        let map = formation_adjustments(Posture::Balanced, &snap, &Assessment::fixed(0.5, 0.5), None);
        assert_eq!(map.len(), 1);
        assert_eq!(target_priorities(&snap).len(), 1);
    }

    #[test]
    fn test_target_tables() {
        let cavalry = target_table(UnitClass::Cavalry);
        assert_eq!(cavalry[0].class, UnitClass::Ranged);
        assert_eq!(cavalry[0].weight, 1.0);
        let infantry = target_table(UnitClass::Infantry);
        let weights: Vec<f32> = infantry.iter().map(|t| t.weight).collect();
        assert_eq!(weights, vec![1.0, 0.9, 0.7, 0.5]);
    }
}
