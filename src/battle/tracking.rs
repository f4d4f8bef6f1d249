//! Per-faction board of tracked threats and opportunities
//!
//! Entries live across cycles so opportunity windows can actually close.
//! Each cycle the board prunes what was zeroed last time, advances every
//! survivor, then merges the fresh detections.

use serde::Serialize;

use crate::battle::host::GroupLookup;
use crate::battle::opportunity::{Opportunity, OpportunityKind};
use crate::battle::threat::{Threat, ThreatKind};
use crate::core::types::{GroupId, MissionTime};

type ThreatKey = (ThreatKind, GroupId, GroupId);
type OpportunityKey = (OpportunityKind, GroupId, Option<GroupId>);

#[derive(Debug, Clone, Default, Serialize)]
pub struct ThreatBoard {
    threats: Vec<Threat>,
    opportunities: Vec<Opportunity>,
}

impl ThreatBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one cycle of bookkeeping against the current group state
    pub fn refresh<L: GroupLookup + ?Sized>(
        &mut self,
        groups: &L,
        elapsed: f32,
        now: MissionTime,
        detected_threats: Vec<Threat>,
        detected_opportunities: Vec<Opportunity>,
    ) {
        self.threats.retain(|t| t.severity() > 0.0);
        self.opportunities.retain(|o| o.value() > 0.0);

        for threat in &mut self.threats {
            threat.update(groups);
        }
        for opportunity in &mut self.opportunities {
            opportunity.update(groups, elapsed);
        }

        self.merge_threats(detected_threats, now);
        self.merge_opportunities(detected_opportunities, now);
    }

    fn merge_threats(&mut self, detected: Vec<Threat>, now: MissionTime) {
        let mut seen: Vec<ThreatKey> = Vec::with_capacity(detected.len());
        for fresh in detected {
            let key = threat_key(&fresh);
            seen.push(key);
            match self.threats.iter_mut().find(|t| threat_key(t) == key) {
                Some(existing) if existing.severity() > 0.0 => {
                    existing.refresh(fresh.severity(), now)
                }
                Some(existing) => *existing = fresh,
                None => self.threats.push(fresh),
            }
        }
        // Threats are only real while something keeps detecting them
        for threat in &mut self.threats {
            if !seen.contains(&threat_key(threat)) {
                threat.retire();
            }
        }
    }

    fn merge_opportunities(&mut self, detected: Vec<Opportunity>, now: MissionTime) {
        for fresh in detected {
            let key = opportunity_key(&fresh);
            match self
                .opportunities
                .iter_mut()
                .find(|o| opportunity_key(o) == key)
            {
                Some(existing) => existing.refresh(fresh.value(), now),
                None => self.opportunities.push(fresh),
            }
        }
    }

    /// Threats with non-zero severity, most severe first
    pub fn active_threats(&self) -> impl Iterator<Item = &Threat> {
        let mut active: Vec<&Threat> = self.threats.iter().filter(|t| t.severity() > 0.0).collect();
        active.sort_by(|a, b| b.severity().total_cmp(&a.severity()));
        active.into_iter()
    }

    /// Opportunities with non-zero value, most valuable first
    pub fn active_opportunities(&self) -> impl Iterator<Item = &Opportunity> {
        let mut active: Vec<&Opportunity> =
            self.opportunities.iter().filter(|o| o.value() > 0.0).collect();
        active.sort_by(|a, b| b.value().total_cmp(&a.value()));
        active.into_iter()
    }

    pub fn len(&self) -> usize {
        self.threats.len() + self.opportunities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn threat_key(threat: &Threat) -> ThreatKey {
    (threat.kind, threat.source, threat.target)
}

fn opportunity_key(opportunity: &Opportunity) -> OpportunityKey {
    (opportunity.kind, opportunity.source, opportunity.target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::groups::{GroupState, UnitClass};
    use crate::core::types::FactionId;
    use glam::{Vec2, Vec3};

    fn groups() -> Vec<GroupState> {
        vec![
            GroupState::new(FactionId(1), UnitClass::Infantry, 30, Vec3::ZERO, Vec2::X),
            GroupState::new(FactionId(2), UnitClass::Cavalry, 20, Vec3::new(90.0, 0.0, 0.0), -Vec2::X),
        ]
    }

    #[test]
    fn test_undetected_threat_retired_then_pruned() {
        let groups = groups();
        let threat = Threat::new(&groups[1], &groups[0], ThreatKind::CavalryCharge, 0.6, 0.0);
        let mut board = ThreatBoard::new();

        board.refresh(&groups, 5.0, 5.0, vec![threat], Vec::new());
        assert_eq!(board.active_threats().count(), 1);

        board.refresh(&groups, 5.0, 10.0, Vec::new(), Vec::new());
        assert_eq!(board.active_threats().count(), 0);
        assert_eq!(board.len(), 1);

        board.refresh(&groups, 5.0, 15.0, Vec::new(), Vec::new());
        assert!(board.is_empty());
    }

    #[test]
    fn test_redetection_refreshes_severity() {
        let groups = groups();
        let mut board = ThreatBoard::new();
        let first = Threat::new(&groups[1], &groups[0], ThreatKind::CavalryCharge, 0.4, 0.0);
        let second = Threat::new(&groups[1], &groups[0], ThreatKind::CavalryCharge, 0.8, 5.0);
        board.refresh(&groups, 0.0, 0.0, vec![first], Vec::new());
        board.refresh(&groups, 5.0, 5.0, vec![second], Vec::new());
        let threats: Vec<&Threat> = board.active_threats().collect();
        assert_eq!(threats.len(), 1);
        assert!((threats[0].severity() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_opportunity_window_closes_despite_redetection() {
        let groups = groups();
        let mut board = ThreatBoard::new();
        let detect = || {
            Opportunity::new(&groups[0], Some(&groups[1]), OpportunityKind::CounterCharge, 0.8, 0.0)
        };

        board.refresh(&groups, 0.0, 0.0, Vec::new(), vec![detect()]);
        // Window is 15s: after four 5s cycles it has closed and decays
        for cycle in 1..=4 {
            board.refresh(&groups, 5.0, cycle as f32 * 5.0, Vec::new(), vec![detect()]);
        }
        let value = board.active_opportunities().next().map(|o| o.value()).unwrap();
        assert!(value < 0.8);
    }

    #[test]
    fn test_active_sorted_by_severity() {
        let groups = groups();
        let mut board = ThreatBoard::new();
        let weak = Threat::new(&groups[1], &groups[0], ThreatKind::FrontalAssault, 0.2, 0.0);
        let strong = Threat::new(&groups[1], &groups[0], ThreatKind::CavalryCharge, 0.9, 0.0);
        board.refresh(&groups, 0.0, 0.0, vec![weak, strong], Vec::new());
        let kinds: Vec<ThreatKind> = board.active_threats().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![ThreatKind::CavalryCharge, ThreatKind::FrontalAssault]);
    }
}
