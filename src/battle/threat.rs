//! Threat model: a danger posed by one enemy group to one friendly group

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::battle::groups::{GroupState, UnitClass};
use crate::battle::host::GroupLookup;
use crate::core::types::{GroupId, MissionTime};
use crate::spatial::direction_to;

/// Severity above which a threat demands an immediate answer
pub const IMMEDIATE_SEVERITY: f32 = 0.7;
/// Seconds-to-impact below which a threat demands an immediate answer
pub const IMMEDIATE_IMPACT_SECS: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatKind {
    FrontalAssault,
    Flanking,
    Encirclement,
    RangedFire,
    CavalryCharge,
    Ambush,
    InfantryOverwhelm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub source: GroupId,
    pub target: GroupId,
    pub source_class: UnitClass,
    pub kind: ThreatKind,
    /// Where the danger comes from (source position)
    pub position: Vec2,
    /// Unit vector from source toward target
    pub direction: Vec2,
    /// Seconds until the source reaches the target at its assumed speed
    pub time_to_impact: f32,
    pub detected_at: MissionTime,
    severity: f32,
}

impl Threat {
    /// Build a threat; `raw_severity` is clamped into 0..=1
    pub fn new(
        source: &GroupState,
        target: &GroupState,
        kind: ThreatKind,
        raw_severity: f32,
        now: MissionTime,
    ) -> Self {
        let mut threat = Self {
            source: source.id,
            target: target.id,
            source_class: source.class,
            kind,
            position: source.ground(),
            direction: Vec2::ZERO,
            time_to_impact: f32::MAX,
            detected_at: now,
            severity: clamp_unit(raw_severity),
        };
        threat.track(source, target);
        threat
    }

    pub fn severity(&self) -> f32 {
        self.severity
    }

    /// Severe or imminent threats
    pub fn requires_immediate_response(&self) -> bool {
        self.severity > IMMEDIATE_SEVERITY || self.time_to_impact < IMMEDIATE_IMPACT_SECS
    }

    /// Both ends of the threat still have units
    pub fn is_still_valid<L: GroupLookup + ?Sized>(&self, groups: &L) -> bool {
        let alive = |id| groups.group(id).is_some_and(|g| g.is_active());
        alive(self.source) && alive(self.target)
    }

    /// Re-derive geometry from current group state, or zero the severity
    /// when either group has gone.
    pub fn update<L: GroupLookup + ?Sized>(&mut self, groups: &L) {
        match (groups.group(self.source), groups.group(self.target)) {
            (Some(source), Some(target)) if source.is_active() && target.is_active() => {
                let (source, target) = (*source, *target);
                self.track(&source, &target);
            }
            _ => self.severity = 0.0,
        }
    }

    /// Replace the severity after a fresh detection
    pub fn refresh(&mut self, raw_severity: f32, now: MissionTime) {
        self.severity = clamp_unit(raw_severity);
        self.detected_at = now;
    }

    /// Retire the threat; it is pruned on the next cycle
    pub fn retire(&mut self) {
        self.severity = 0.0;
    }

    fn track(&mut self, source: &GroupState, target: &GroupState) {
        self.position = source.ground();
        self.direction = direction_to(source.ground(), target.ground());
        let speed = source.class.assumed_speed();
        self.time_to_impact = if speed > 0.0 {
            source.distance_to(target) / speed
        } else {
            f32::MAX
        };
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FactionId;
    use glam::Vec3;

    fn group(class: UnitClass, count: u32, x: f32) -> GroupState {
        GroupState::new(FactionId(1), class, count, Vec3::new(x, 0.0, 0.0), Vec2::X)
    }

    #[test]
    fn test_severity_clamped() {
        let a = group(UnitClass::Cavalry, 20, 0.0);
        let b = group(UnitClass::Infantry, 20, 80.0);
        assert_eq!(Threat::new(&a, &b, ThreatKind::CavalryCharge, 3.0, 0.0).severity(), 1.0);
        assert_eq!(Threat::new(&a, &b, ThreatKind::CavalryCharge, -1.0, 0.0).severity(), 0.0);
        assert_eq!(Threat::new(&a, &b, ThreatKind::CavalryCharge, f32::NAN, 0.0).severity(), 0.0);
    }

    #[test]
    fn test_time_to_impact_uses_class_speed() {
        let cavalry = group(UnitClass::Cavalry, 20, 0.0);
        let archers = group(UnitClass::Ranged, 20, 0.0);
        let target = group(UnitClass::Infantry, 20, 80.0);
        let charge = Threat::new(&cavalry, &target, ThreatKind::CavalryCharge, 0.3, 0.0);
        let volley = Threat::new(&archers, &target, ThreatKind::RangedFire, 0.3, 0.0);
        assert!((charge.time_to_impact - 10.0).abs() < 1e-4);
        assert!((volley.time_to_impact - 32.0).abs() < 1e-4);
        assert!(charge.time_to_impact < volley.time_to_impact);
        assert!((charge.direction - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn test_immediate_response_flag() {
        let cavalry = group(UnitClass::Cavalry, 20, 0.0);
        let near = group(UnitClass::Infantry, 20, 40.0);
        let far = group(UnitClass::Infantry, 20, 180.0);
        assert!(Threat::new(&cavalry, &near, ThreatKind::CavalryCharge, 0.2, 0.0).requires_immediate_response());
        assert!(!Threat::new(&cavalry, &far, ThreatKind::CavalryCharge, 0.2, 0.0).requires_immediate_response());
        assert!(Threat::new(&cavalry, &far, ThreatKind::CavalryCharge, 0.8, 0.0).requires_immediate_response());
    }

    #[test]
    fn test_update_zeroes_when_target_destroyed() {
        let source = group(UnitClass::Infantry, 20, 0.0);
        let mut target = group(UnitClass::Infantry, 20, 50.0);
        let mut threat = Threat::new(&source, &target, ThreatKind::FrontalAssault, 0.6, 0.0);

        let groups = vec![source, target];
        threat.update(&groups);
        assert!(threat.is_still_valid(&groups));
        assert!((threat.severity() - 0.6).abs() < 1e-6);

        target.count = 0;
        let groups = vec![source, target];
        assert!(!threat.is_still_valid(&groups));
        threat.update(&groups);
        assert_eq!(threat.severity(), 0.0);
    }

    #[test]
    fn test_update_tracks_movement() {
        let mut source = group(UnitClass::Infantry, 20, 0.0);
        let target = group(UnitClass::Infantry, 20, 60.0);
        let mut threat = Threat::new(&source, &target, ThreatKind::FrontalAssault, 0.5, 0.0);
        source.position = Vec3::new(30.0, 0.0, 0.0);
        threat.update(&vec![source, target]);
        assert_eq!(threat.position, Vec2::new(30.0, 0.0));
        assert!((threat.time_to_impact - 10.0).abs() < 1e-4);
    }
}
