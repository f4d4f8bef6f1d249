//! Stabilization gate: keeps factions from re-issuing orders every cycle
//!
//! A bundle is applied when it is the first, when enough time has passed
//! and it differs from the last applied one, when twice the interval has
//! passed even though it is similar, or at any time while a critical
//! threat response is pending.

use serde::Serialize;

use crate::battle::ai::decisions::DecisionBundle;
use crate::core::config::TacticsConfig;
use crate::core::types::MissionTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateVerdict {
    /// Nothing applied yet for this faction
    First,
    /// Interval elapsed and the bundle differs from the last applied
    Changed,
    /// Similar bundle, but twice the interval has elapsed
    Refreshed,
    /// Critical threat response bypasses the interval
    CriticalOverride,
    /// Too soon since the last applied bundle
    TooSoon,
    /// Similar to the last applied bundle and not yet due for refresh
    Unchanged,
}

impl GateVerdict {
    pub fn passes(self) -> bool {
        matches!(
            self,
            GateVerdict::First
                | GateVerdict::Changed
                | GateVerdict::Refreshed
                | GateVerdict::CriticalOverride
        )
    }
}

/// Per-faction record of what was last applied
#[derive(Debug, Clone, Default)]
pub struct GateState {
    last_applied: Option<DecisionBundle>,
    last_applied_at: MissionTime,
}

impl GateState {
    pub fn last_applied(&self) -> Option<&DecisionBundle> {
        self.last_applied.as_ref()
    }

    pub fn last_applied_at(&self) -> Option<MissionTime> {
        self.last_applied.as_ref().map(|_| self.last_applied_at)
    }

    /// Remember a bundle that was actually executed
    pub fn record(&mut self, bundle: DecisionBundle, now: MissionTime) {
        self.last_applied = Some(bundle);
        self.last_applied_at = now;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StabilizationGate {
    min_interval: f32,
    critical_priority: f32,
    similarity_threshold: f32,
}

impl StabilizationGate {
    pub fn new(config: &TacticsConfig) -> Self {
        Self {
            min_interval: config.timing.min_change_interval,
            critical_priority: config.gate.critical_priority,
            similarity_threshold: config.gate.similarity_threshold,
        }
    }

    /// Decide whether `bundle` may be applied at `now`
    pub fn evaluate(&self, state: &GateState, bundle: &DecisionBundle, now: MissionTime) -> GateVerdict {
        let Some(last) = state.last_applied() else {
            return GateVerdict::First;
        };
        let elapsed = now - state.last_applied_at;

        if elapsed < self.min_interval {
            return if bundle.max_response_priority() > self.critical_priority {
                GateVerdict::CriticalOverride
            } else {
                GateVerdict::TooSoon
            };
        }

        let similar = bundle.posture == last.posture
            && maneuver_overlap(bundle, last) >= self.similarity_threshold;
        if !similar {
            GateVerdict::Changed
        } else if elapsed >= self.min_interval * 2.0 {
            GateVerdict::Refreshed
        } else {
            GateVerdict::Unchanged
        }
    }
}

/// Share of the new bundle's maneuver kinds that the old bundle also had.
///
/// Two empty lists are identical; an empty new list against a non-empty
/// old one shares nothing.
pub fn maneuver_overlap(new: &DecisionBundle, old: &DecisionBundle) -> f32 {
    if new.maneuvers.is_empty() {
        return if old.maneuvers.is_empty() { 1.0 } else { 0.0 };
    }
    let shared = new
        .maneuvers
        .iter()
        .filter(|m| old.has_maneuver(m.kind))
        .count();
    shared as f32 / new.maneuvers.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::ai::decisions::{
        Maneuver, ManeuverKind, Posture, ResponseKind, ThreatResponse,
    };
    use crate::battle::groups::{GroupState, UnitClass};
    use crate::battle::threat::{Threat, ThreatKind};
    use crate::core::types::FactionId;
    use glam::{Vec2, Vec3};
    use std::collections::BTreeMap;

    fn bundle(posture: Posture, kinds: &[ManeuverKind]) -> DecisionBundle {
        DecisionBundle {
            faction: FactionId(1),
            time: 0.0,
            posture,
            overall_situation: 0.5,
            maneuvers: kinds
                .iter()
                .map(|k| Maneuver::new(*k, 0.8, Vec::new()))
                .collect(),
            responses: Vec::new(),
            actions: Vec::new(),
            formations: BTreeMap::new(),
            targets: BTreeMap::new(),
        }
    }

    fn with_response(mut bundle: DecisionBundle, priority: f32) -> DecisionBundle {
        let a = GroupState::new(FactionId(2), UnitClass::Cavalry, 20, Vec3::ZERO, Vec2::X);
        let b = GroupState::new(FactionId(1), UnitClass::Infantry, 20, Vec3::X * 50.0, -Vec2::X);
        bundle.responses.push(ThreatResponse {
            kind: ResponseKind::DefensiveSquare,
            priority,
            groups: vec![b.id],
            threat: Threat::new(&a, &b, ThreatKind::CavalryCharge, 0.9, 0.0),
        });
        bundle
    }

    const DEFENSIVE: [ManeuverKind; 3] = [
        ManeuverKind::SeekHighGround,
        ManeuverKind::FormDefensiveLine,
        ManeuverKind::FormShieldWall,
    ];

    fn gate() -> StabilizationGate {
        StabilizationGate::new(&TacticsConfig::default())
    }

    #[test]
    fn test_first_bundle_passes() {
        let state = GateState::default();
        let verdict = gate().evaluate(&state, &bundle(Posture::Defensive, &DEFENSIVE), 0.0);
        assert_eq!(verdict, GateVerdict::First);
        assert!(verdict.passes());
    }

    #[test]
    fn test_too_soon_blocks() {
        let mut state = GateState::default();
        state.record(bundle(Posture::Defensive, &DEFENSIVE), 0.0);
        let verdict = gate().evaluate(&state, &bundle(Posture::Defensive, &DEFENSIVE), 5.0);
        assert_eq!(verdict, GateVerdict::TooSoon);
        assert!(!verdict.passes());
    }

    #[test]
    fn test_critical_response_overrides_interval() {
        let mut state = GateState::default();
        state.record(bundle(Posture::Defensive, &DEFENSIVE), 0.0);
        let urgent = with_response(bundle(Posture::Defensive, &DEFENSIVE), 0.95);
        assert_eq!(gate().evaluate(&state, &urgent, 5.0), GateVerdict::CriticalOverride);

        let exactly = with_response(bundle(Posture::Defensive, &DEFENSIVE), 0.9);
        assert_eq!(gate().evaluate(&state, &exactly, 5.0), GateVerdict::TooSoon);
    }

    #[test]
    fn test_similar_needs_double_interval() {
        let mut state = GateState::default();
        state.record(bundle(Posture::Defensive, &DEFENSIVE), 0.0);
        let similar = bundle(
            Posture::Defensive,
            &[
                ManeuverKind::SeekHighGround,
                ManeuverKind::FormDefensiveLine,
                ManeuverKind::FormShieldWall,
            ],
        );
        assert_eq!(gate().evaluate(&state, &similar, 12.0), GateVerdict::Unchanged);
        assert_eq!(gate().evaluate(&state, &similar, 20.0), GateVerdict::Refreshed);
    }

    #[test]
    fn test_changed_bundle_applies_after_interval() {
        let mut state = GateState::default();
        state.record(bundle(Posture::Defensive, &DEFENSIVE), 0.0);
        let posture_change = bundle(Posture::Balanced, &DEFENSIVE);
        assert_eq!(gate().evaluate(&state, &posture_change, 10.0), GateVerdict::Changed);

        // Two of three kinds shared is below 70%
        let shifted = bundle(
            Posture::Defensive,
            &[
                ManeuverKind::SeekHighGround,
                ManeuverKind::FormDefensiveLine,
                ManeuverKind::HoldCavalryInReserve,
            ],
        );
        assert_eq!(gate().evaluate(&state, &shifted, 10.0), GateVerdict::Changed);
    }

    #[test]
    fn test_overlap_ratio() {
        let old = bundle(Posture::Defensive, &DEFENSIVE);
        let grown = bundle(
            Posture::Defensive,
            &[
                ManeuverKind::SeekHighGround,
                ManeuverKind::FormDefensiveLine,
                ManeuverKind::FormShieldWall,
                ManeuverKind::FeignedRetreat,
            ],
        );
        assert!((maneuver_overlap(&grown, &old) - 0.75).abs() < 1e-6);
        let empty = bundle(Posture::Defensive, &[]);
        assert_eq!(maneuver_overlap(&empty, &old), 0.0);
        assert_eq!(maneuver_overlap(&empty, &bundle(Posture::Defensive, &[])), 1.0);
    }
}
