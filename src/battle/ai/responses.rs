//! Threat responses and opportunity actions
//!
//! Fixed kind-to-answer mappings. Priority is the threat severity or
//! opportunity value times a per-answer multiplier; the variation step
//! clamps it back into range afterwards.

use ordered_float::OrderedFloat;

use crate::battle::ai::decisions::{ActionKind, OpportunityAction, ResponseKind, ThreatResponse};
use crate::battle::groups::UnitClass;
use crate::battle::opportunity::{Opportunity, OpportunityKind};
use crate::battle::snapshot::Snapshot;
use crate::battle::threat::{Threat, ThreatKind};
use crate::core::types::GroupId;

// Minimum unit counts before a class is trusted with a counter-move
const CAVALRY_FOR_ARCHER_HUNT: u32 = 8;
const CAVALRY_FOR_FLANK: u32 = 10;
const ARCHERS_FOR_VOLLEY: u32 = 15;
const MOUNTED_FOR_STRIKE: u32 = 5;

/// One response per threat, most severe threat first
pub fn threat_responses(snapshot: &Snapshot) -> Vec<ThreatResponse> {
    let mut threats: Vec<&Threat> = snapshot.threats.iter().filter(|t| t.severity() > 0.0).collect();
    threats.sort_by_key(|t| std::cmp::Reverse(OrderedFloat(t.severity())));

    threats
        .into_iter()
        .filter_map(|threat| {
            let (kind, multiplier, groups) = respond(snapshot, threat);
            if groups.is_empty() {
                return None;
            }
            Some(ThreatResponse {
                kind,
                priority: threat.severity() * multiplier,
                groups,
                threat: threat.clone(),
            })
        })
        .collect()
}

fn respond(snapshot: &Snapshot, threat: &Threat) -> (ResponseKind, f32, Vec<GroupId>) {
    let infantry = || or_threatened(snapshot.own_ids(UnitClass::Infantry), threat);

    match threat.kind {
        ThreatKind::CavalryCharge => {
            if snapshot.infantry_has_spears() {
                (ResponseKind::AntiCavalryBrace, 1.2, infantry())
            } else {
                (ResponseKind::DefensiveSquare, 1.0, infantry())
            }
        }
        ThreatKind::RangedFire => {
            if snapshot.infantry_has_shields() {
                let shielded = snapshot
                    .own_of(UnitClass::Infantry)
                    .filter(|g| g.has_shield)
                    .map(|g| g.id)
                    .collect();
                (ResponseKind::RaiseShields, 1.0, shielded)
            } else if snapshot.own_count(UnitClass::Cavalry) >= CAVALRY_FOR_ARCHER_HUNT {
                (
                    ResponseKind::ChargeCavalryAtRanged,
                    1.0,
                    snapshot.own_ids(UnitClass::Cavalry),
                )
            } else {
                (ResponseKind::AdvanceQuickly, 1.0, snapshot.all_own_ids())
            }
        }
        ThreatKind::InfantryOverwhelm | ThreatKind::FrontalAssault => {
            if snapshot.own_count(UnitClass::Cavalry) >= CAVALRY_FOR_FLANK {
                (
                    ResponseKind::FlankWithCavalry,
                    1.0,
                    snapshot.own_ids(UnitClass::Cavalry),
                )
            } else if snapshot.own_count(UnitClass::Ranged) >= ARCHERS_FOR_VOLLEY {
                (
                    ResponseKind::ConcentrateRangedFire,
                    1.0,
                    snapshot.own_ids(UnitClass::Ranged),
                )
            } else {
                (ResponseKind::FormDefensiveLine, 1.0, infantry())
            }
        }
        ThreatKind::Flanking => (
            ResponseKind::FormDefensiveLine,
            1.0,
            or_threatened(Vec::new(), threat),
        ),
        ThreatKind::Encirclement => (ResponseKind::DefensiveCircle, 1.3, snapshot.all_own_ids()),
        ThreatKind::Ambush => (ResponseKind::ReformAndRegroup, 1.4, snapshot.all_own_ids()),
    }
}

/// Fall back to the threatened group itself when no preferred group exists
fn or_threatened(groups: Vec<GroupId>, threat: &Threat) -> Vec<GroupId> {
    if groups.is_empty() {
        vec![threat.target]
    } else {
        groups
    }
}

/// One action per actionable opportunity, most valuable first
pub fn opportunity_actions(snapshot: &Snapshot) -> Vec<OpportunityAction> {
    let mut opportunities: Vec<&Opportunity> = snapshot
        .opportunities
        .iter()
        .filter(|o| o.value() > 0.0)
        .collect();
    opportunities.sort_by_key(|o| std::cmp::Reverse(OrderedFloat(o.value())));

    opportunities
        .into_iter()
        .filter_map(|opportunity| {
            let (kind, multiplier, groups) = exploit(snapshot, opportunity)?;
            if groups.is_empty() {
                return None;
            }
            Some(OpportunityAction {
                kind,
                priority: opportunity.value() * multiplier,
                groups,
                opportunity: opportunity.clone(),
            })
        })
        .collect()
}

fn exploit(
    snapshot: &Snapshot,
    opportunity: &Opportunity,
) -> Option<(ActionKind, f32, Vec<GroupId>)> {
    let action = match opportunity.kind {
        OpportunityKind::VulnerableRanged => {
            let groups = if snapshot.own_count(UnitClass::Cavalry) >= MOUNTED_FOR_STRIKE {
                snapshot.own_ids(UnitClass::Cavalry)
            } else if snapshot.own_count(UnitClass::MountedRanged) >= MOUNTED_FOR_STRIKE {
                snapshot.own_ids(UnitClass::MountedRanged)
            } else {
                snapshot.own_ids(UnitClass::Infantry)
            };
            (ActionKind::StrikeVulnerableRanged, 1.2, groups)
        }
        OpportunityKind::IsolatedFormation | OpportunityKind::Encirclement => {
            (ActionKind::SurroundIsolated, 1.1, snapshot.all_own_ids())
        }
        OpportunityKind::HighGround | OpportunityKind::DefensivePosition => {
            let ranged = snapshot.own_ids(UnitClass::Ranged);
            let groups = if ranged.is_empty() {
                snapshot.own_ids(UnitClass::Infantry)
            } else {
                // Archers take the ground with an infantry escort
                let mut escorted = ranged;
                escorted.extend(snapshot.own_ids(UnitClass::Infantry));
                escorted
            };
            (ActionKind::OccupyPosition, 1.0, groups)
        }
        OpportunityKind::EnemyDivision => {
            let mut groups = snapshot.own_ids(UnitClass::Cavalry);
            groups.extend(snapshot.own_ids(UnitClass::Infantry));
            (ActionKind::ExploitDivision, 1.15, groups)
        }
        OpportunityKind::CounterCharge => {
            let cavalry = snapshot.own_ids(UnitClass::Cavalry);
            let groups = if cavalry.is_empty() {
                snapshot.own_ids(UnitClass::Infantry)
            } else {
                cavalry
            };
            (ActionKind::CounterCharge, 1.25, groups)
        }
        // Flanks feed the balanced menu; ranged superiority only lifts momentum
        OpportunityKind::Flanking | OpportunityKind::RangedAdvantage => return None,
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::groups::GroupState;
    use crate::battle::snapshot::SnapshotBuilder;
    use crate::core::types::FactionId;
    use crate::spatial::FlatTerrain;
    use glam::{Vec2, Vec3};

    fn own(class: UnitClass, count: u32) -> GroupState {
        GroupState::new(FactionId(1), class, count, Vec3::ZERO, Vec2::X)
    }

    fn enemy(class: UnitClass) -> GroupState {
        GroupState::new(FactionId(2), class, 20, Vec3::new(100.0, 0.0, 0.0), -Vec2::X)
    }

    fn snapshot(own_groups: Vec<GroupState>, enemy_groups: Vec<GroupState>) -> Snapshot {
        SnapshotBuilder::new(FactionId(1))
            .own_groups(own_groups)
            .enemy_groups(enemy_groups)
            .build(&FlatTerrain::default())
    }

    fn with_threat(mut snap: Snapshot, kind: ThreatKind, severity: f32) -> Snapshot {
        let threat = Threat::new(&snap.enemy_groups[0], &snap.own_groups[0], kind, severity, 0.0);
        snap.threats.push(threat);
        snap
    }

    #[test]
    fn test_spears_brace_against_cavalry() {
        let snap = snapshot(
            vec![own(UnitClass::Infantry, 30).with_spears()],
            vec![enemy(UnitClass::Cavalry)],
        );
        let snap = with_threat(snap, ThreatKind::CavalryCharge, 0.5);
        let responses = threat_responses(&snap);
        assert_eq!(responses[0].kind, ResponseKind::AntiCavalryBrace);
        assert!((responses[0].priority - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_square_without_spears() {
        let snap = snapshot(vec![own(UnitClass::Infantry, 30)], vec![enemy(UnitClass::Cavalry)]);
        let snap = with_threat(snap, ThreatKind::CavalryCharge, 0.5);
        let responses = threat_responses(&snap);
        assert_eq!(responses[0].kind, ResponseKind::DefensiveSquare);
        assert_eq!(responses[0].priority, 0.5);
    }

    #[test]
    fn test_ranged_fire_answers() {
        let shields = snapshot(
            vec![own(UnitClass::Infantry, 30).with_shields()],
            vec![enemy(UnitClass::Ranged)],
        );
        let shields = with_threat(shields, ThreatKind::RangedFire, 0.5);
        assert_eq!(threat_responses(&shields)[0].kind, ResponseKind::RaiseShields);

        let riders = snapshot(
            vec![own(UnitClass::Infantry, 30), own(UnitClass::Cavalry, 8)],
            vec![enemy(UnitClass::Ranged)],
        );
        let riders = with_threat(riders, ThreatKind::RangedFire, 0.5);
        assert_eq!(
            threat_responses(&riders)[0].kind,
            ResponseKind::ChargeCavalryAtRanged
        );

        let exposed = snapshot(vec![own(UnitClass::Infantry, 30)], vec![enemy(UnitClass::Ranged)]);
        let exposed = with_threat(exposed, ThreatKind::RangedFire, 0.5);
        assert_eq!(threat_responses(&exposed)[0].kind, ResponseKind::AdvanceQuickly);
    }

    #[test]
    fn test_overwhelm_answers() {
        let cavalry = snapshot(
            vec![own(UnitClass::Infantry, 30), own(UnitClass::Cavalry, 10)],
            vec![enemy(UnitClass::Infantry)],
        );
        let cavalry = with_threat(cavalry, ThreatKind::InfantryOverwhelm, 0.5);
        assert_eq!(threat_responses(&cavalry)[0].kind, ResponseKind::FlankWithCavalry);

        let archers = snapshot(
            vec![own(UnitClass::Infantry, 30), own(UnitClass::Ranged, 15)],
            vec![enemy(UnitClass::Infantry)],
        );
        let archers = with_threat(archers, ThreatKind::InfantryOverwhelm, 0.5);
        assert_eq!(
            threat_responses(&archers)[0].kind,
            ResponseKind::ConcentrateRangedFire
        );

        let alone = snapshot(vec![own(UnitClass::Infantry, 30)], vec![enemy(UnitClass::Infantry)]);
        let alone = with_threat(alone, ThreatKind::InfantryOverwhelm, 0.5);
        assert_eq!(threat_responses(&alone)[0].kind, ResponseKind::FormDefensiveLine);
    }

    #[test]
    fn test_urgent_multipliers_and_order() {
        let snap = snapshot(
            vec![own(UnitClass::Infantry, 30)],
            vec![enemy(UnitClass::Infantry)],
        );
        let snap = with_threat(snap, ThreatKind::Encirclement, 0.5);
        let snap = with_threat(snap, ThreatKind::Ambush, 0.6);
        let responses = threat_responses(&snap);
        assert_eq!(responses[0].kind, ResponseKind::ReformAndRegroup);
        assert!((responses[0].priority - 0.84).abs() < 1e-6);
        assert_eq!(responses[1].kind, ResponseKind::DefensiveCircle);
        assert!((responses[1].priority - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_opportunity_actions() {
        let mut snap = snapshot(
            vec![own(UnitClass::Infantry, 30), own(UnitClass::Cavalry, 6)],
            vec![enemy(UnitClass::Ranged)],
        );
        let source = snap.own_groups[1];
        let target = snap.enemy_groups[0];
        snap.opportunities = vec![
            Opportunity::new(&source, Some(&target), OpportunityKind::VulnerableRanged, 0.5, 0.0),
            Opportunity::new(&source, Some(&target), OpportunityKind::CounterCharge, 0.7, 0.0),
            Opportunity::new(&source, Some(&target), OpportunityKind::Flanking, 0.9, 0.0),
        ];
        let actions = opportunity_actions(&snap);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].kind, ActionKind::CounterCharge);
        assert!((actions[0].priority - 0.875).abs() < 1e-6);
        assert_eq!(actions[0].groups, vec![source.id]);
        assert_eq!(actions[1].kind, ActionKind::StrikeVulnerableRanged);
        assert!((actions[1].priority - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_occupy_prefers_escorted_archers() {
        let mut snap = snapshot(
            vec![own(UnitClass::Infantry, 30), own(UnitClass::Ranged, 20)],
            vec![enemy(UnitClass::Infantry)],
        );
        let source = snap.own_groups[1];
        snap.opportunities = vec![Opportunity::new(
            &source,
            Some(&snap.enemy_groups[0]),
            OpportunityKind::HighGround,
            0.5,
            0.0,
        )];
        let actions = opportunity_actions(&snap);
        assert_eq!(actions[0].kind, ActionKind::OccupyPosition);
        assert_eq!(actions[0].groups.len(), 2);
        assert_eq!(actions[0].groups[0], source.id);
    }
}
