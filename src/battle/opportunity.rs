//! Opportunity model: an exploitable condition with a closing time window

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::battle::groups::GroupState;
use crate::battle::host::GroupLookup;
use crate::battle::threat::clamp_unit;
use crate::core::types::{GroupId, MissionTime};
use crate::spatial::{direction_to, left_of};

/// Lateral offset from the target for flanking/encirclement positions
pub const FLANK_OFFSET: f32 = 20.0;
/// Multiplicative decay applied per update once the window has closed
pub const EXPIRED_DECAY: f32 = 0.9;
/// Values below this after decay are zeroed
pub const RETIRE_VALUE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityKind {
    Flanking,
    Encirclement,
    HighGround,
    DefensivePosition,
    CounterCharge,
    RangedAdvantage,
    VulnerableRanged,
    IsolatedFormation,
    EnemyDivision,
}

impl OpportunityKind {
    /// Seconds the opportunity stays fresh
    pub fn initial_window(self) -> f32 {
        match self {
            OpportunityKind::Flanking | OpportunityKind::CounterCharge => 15.0,
            OpportunityKind::Encirclement => 30.0,
            OpportunityKind::HighGround | OpportunityKind::DefensivePosition => 120.0,
            _ => 60.0,
        }
    }

    /// Inherently short-lived kinds
    pub fn is_transient(self) -> bool {
        matches!(self, OpportunityKind::Flanking | OpportunityKind::CounterCharge)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// Friendly group best placed to exploit it
    pub source: GroupId,
    /// Enemy group involved, if any
    pub target: Option<GroupId>,
    pub kind: OpportunityKind,
    pub position: Vec2,
    pub transient: bool,
    pub detected_at: MissionTime,
    value: f32,
    window: f32,
}

impl Opportunity {
    /// Build an opportunity; `raw_value` is clamped into 0..=1
    pub fn new(
        source: &GroupState,
        target: Option<&GroupState>,
        kind: OpportunityKind,
        raw_value: f32,
        now: MissionTime,
    ) -> Self {
        Self {
            source: source.id,
            target: target.map(|t| t.id),
            kind,
            position: derive_position(kind, source, target),
            transient: kind.is_transient(),
            detected_at: now,
            value: clamp_unit(raw_value),
            window: kind.initial_window(),
        }
    }

    /// Override the remaining window
    pub fn with_window(mut self, seconds: f32) -> Self {
        self.window = seconds;
        self
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Seconds left before the value starts to decay
    pub fn window(&self) -> f32 {
        self.window
    }

    pub fn is_expired(&self) -> bool {
        self.window <= 0.0
    }

    /// Source still has units and the target, if any, does too
    pub fn is_still_valid<L: GroupLookup + ?Sized>(&self, groups: &L) -> bool {
        let source_alive = groups.group(self.source).is_some_and(|g| g.is_active());
        let target_alive = match self.target {
            Some(id) => groups.group(id).is_some_and(|g| g.is_active()),
            None => true,
        };
        source_alive && target_alive
    }

    /// Advance the opportunity by `elapsed` seconds.
    ///
    /// Invalid opportunities drop to zero at once. Otherwise the position
    /// follows the groups, the window shrinks, and once it has closed the
    /// value decays by 10% per update until it falls under 0.1.
    pub fn update<L: GroupLookup + ?Sized>(&mut self, groups: &L, elapsed: f32) {
        if !self.is_still_valid(groups) {
            self.value = 0.0;
            return;
        }

        if let Some(source) = groups.group(self.source) {
            let target = self.target.and_then(|id| groups.group(id));
            self.position = derive_position(self.kind, source, target);
        }

        self.window -= elapsed.max(0.0);
        if self.window <= 0.0 {
            self.value *= EXPIRED_DECAY;
            if self.value < RETIRE_VALUE {
                self.value = 0.0;
            }
        }
    }

    /// Fresh detection of the same condition; only counts while the window
    /// is still open
    pub fn refresh(&mut self, raw_value: f32, now: MissionTime) {
        if !self.is_expired() {
            self.value = clamp_unit(raw_value);
            self.detected_at = now;
        }
    }
}

fn derive_position(kind: OpportunityKind, source: &GroupState, target: Option<&GroupState>) -> Vec2 {
    let Some(target) = target else {
        return source.ground();
    };
    match kind {
        OpportunityKind::Flanking | OpportunityKind::Encirclement => {
            let dir = direction_to(source.ground(), target.ground());
            target.ground() + left_of(dir) * FLANK_OFFSET
        }
        OpportunityKind::HighGround => source.ground(),
        _ => (source.ground() + target.ground()) * 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::groups::UnitClass;
    use crate::core::types::FactionId;
    use glam::Vec3;

    fn pair() -> (GroupState, GroupState) {
        let source = GroupState::new(FactionId(1), UnitClass::Cavalry, 20, Vec3::ZERO, Vec2::X);
        let target = GroupState::new(
            FactionId(2),
            UnitClass::Ranged,
            20,
            Vec3::new(100.0, 0.0, 0.0),
            -Vec2::X,
        );
        (source, target)
    }

    #[test]
    fn test_windows_by_kind() {
        assert_eq!(OpportunityKind::Flanking.initial_window(), 15.0);
        assert_eq!(OpportunityKind::CounterCharge.initial_window(), 15.0);
        assert_eq!(OpportunityKind::Encirclement.initial_window(), 30.0);
        assert_eq!(OpportunityKind::HighGround.initial_window(), 120.0);
        assert_eq!(OpportunityKind::DefensivePosition.initial_window(), 120.0);
        assert_eq!(OpportunityKind::VulnerableRanged.initial_window(), 60.0);
        assert!(OpportunityKind::Flanking.is_transient());
        assert!(!OpportunityKind::HighGround.is_transient());
    }

    #[test]
    fn test_positions_by_kind() {
        let (source, target) = pair();
        let flank = Opportunity::new(&source, Some(&target), OpportunityKind::Flanking, 0.5, 0.0);
        assert!((flank.position - Vec2::new(100.0, 20.0)).length() < 1e-4);

        let high = Opportunity::new(&source, Some(&target), OpportunityKind::HighGround, 0.5, 0.0);
        assert_eq!(high.position, Vec2::ZERO);

        let strike =
            Opportunity::new(&source, Some(&target), OpportunityKind::VulnerableRanged, 0.5, 0.0);
        assert!((strike.position - Vec2::new(50.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_expired_window_decays_value() {
        let (source, target) = pair();
        let groups = vec![source, target];
        let mut opp = Opportunity::new(&source, Some(&target), OpportunityKind::EnemyDivision, 0.8, 0.0)
            .with_window(0.05);

        opp.update(&groups, 0.1);
        assert!(opp.window() <= 0.0);
        assert!((opp.value() - 0.72).abs() < 1e-5);

        let mut updates = 1;
        while opp.value() > 0.0 {
            opp.update(&groups, 0.1);
            updates += 1;
            assert!(updates < 100, "value never retired");
        }
        assert_eq!(opp.value(), 0.0);
    }

    #[test]
    fn test_open_window_keeps_value() {
        let (source, target) = pair();
        let groups = vec![source, target];
        let mut opp = Opportunity::new(&source, Some(&target), OpportunityKind::HighGround, 0.6, 0.0);
        opp.update(&groups, 5.0);
        assert_eq!(opp.window(), 115.0);
        assert_eq!(opp.value(), 0.6);
    }

    #[test]
    fn test_invalid_target_zeroes_value() {
        let (source, mut target) = pair();
        let mut opp = Opportunity::new(&source, Some(&target), OpportunityKind::IsolatedFormation, 0.9, 0.0);
        target.count = 0;
        opp.update(&vec![source, target], 1.0);
        assert_eq!(opp.value(), 0.0);
    }

    #[test]
    fn test_untargeted_needs_only_source() {
        let (source, _) = pair();
        let opp = Opportunity::new(&source, None, OpportunityKind::RangedAdvantage, 0.4, 0.0);
        assert!(opp.is_still_valid(&vec![source]));
        assert_eq!(opp.position, source.ground());
    }

    #[test]
    fn test_refresh_ignored_after_expiry() {
        let (source, target) = pair();
        let mut opp = Opportunity::new(&source, Some(&target), OpportunityKind::Flanking, 0.5, 0.0);
        opp.refresh(0.9, 1.0);
        assert_eq!(opp.value(), 0.9);
        let mut expired = opp.clone().with_window(0.0);
        expired.refresh(0.2, 2.0);
        assert_eq!(expired.value(), 0.9);
    }
}
