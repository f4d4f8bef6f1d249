//! Decision bundle: everything the policy decided for one faction in one
//! cycle. Produced by `DecisionPolicy`, only read by the executor.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::battle::groups::{Shape, Spacing, UnitClass};
use crate::battle::opportunity::Opportunity;
use crate::battle::threat::Threat;
use crate::core::types::{FactionId, GroupId, MissionTime};
use crate::spatial::FlankSide;

/// Below this overall situation the faction defends
pub const DEFENSIVE_BELOW: f32 = 0.4;
/// Below this (and not defensive) the faction stays balanced
pub const BALANCED_BELOW: f32 = 0.6;

/// Coarse strategic stance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Posture {
    Defensive,
    Balanced,
    Offensive,
}

impl Posture {
    /// Pick the posture for an overall-situation value
    pub fn from_situation(situation: f32) -> Self {
        if situation < DEFENSIVE_BELOW {
            Posture::Defensive
        } else if situation < BALANCED_BELOW {
            Posture::Balanced
        } else {
            Posture::Offensive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManeuverKind {
    // Defensive menu
    SeekHighGround,
    FormDefensiveLine,
    PositionRangedBehindInfantry,
    HoldCavalryInReserve,
    FormShieldWall,
    FormSpearWall,
    // Balanced menu
    AdvanceInFormation,
    PositionRangedForEffectiveness,
    PrepareCavalryFlank,
    ExploitFlankingOpportunity,
    // Offensive menu
    FrontalAssault,
    AggressiveCavalryFlank,
    AdvanceRangedForDamage,
    Envelopment,
    CoordinatedStrike,
    // Faction signatures
    FormWedge,
    ShockInfantryCharge,
    HeavyCavalryCharge,
    MountedArcherHarassment,
    MultiDirectionalAmbush,
    ForestArcherTactics,
    // Unexpected
    FeignedRetreat,
    SuddenFormationChange,
    HiddenReserveDeployment,
    Distraction,
    FalseFlanking,
}

impl ManeuverKind {
    /// Surprise maneuvers the variation step may add
    pub const UNEXPECTED: [ManeuverKind; 5] = [
        ManeuverKind::FeignedRetreat,
        ManeuverKind::SuddenFormationChange,
        ManeuverKind::HiddenReserveDeployment,
        ManeuverKind::Distraction,
        ManeuverKind::FalseFlanking,
    ];

    pub fn is_unexpected(self) -> bool {
        Self::UNEXPECTED.contains(&self)
    }
}

/// A proposed large-scale action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maneuver {
    pub kind: ManeuverKind,
    pub priority: f32,
    /// Own groups that carry it out; empty means "bind at execution"
    pub groups: Vec<GroupId>,
    pub target_position: Option<Vec2>,
    /// Enemy group the maneuver is aimed at
    pub target_group: Option<GroupId>,
    pub side: Option<FlankSide>,
}

impl Maneuver {
    pub fn new(kind: ManeuverKind, priority: f32, groups: Vec<GroupId>) -> Self {
        Self {
            kind,
            priority,
            groups,
            target_position: None,
            target_group: None,
            side: None,
        }
    }

    pub fn aimed_at(mut self, position: Vec2, group: Option<GroupId>) -> Self {
        self.target_position = Some(position);
        self.target_group = group;
        self
    }

    pub fn on_side(mut self, side: FlankSide) -> Self {
        self.side = Some(side);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    AntiCavalryBrace,
    DefensiveSquare,
    RaiseShields,
    ChargeCavalryAtRanged,
    AdvanceQuickly,
    FlankWithCavalry,
    ConcentrateRangedFire,
    FormDefensiveLine,
    DefensiveCircle,
    ReformAndRegroup,
}

/// Answer to one threat
#[derive(Debug, Clone, Serialize)]
pub struct ThreatResponse {
    pub kind: ResponseKind,
    pub priority: f32,
    pub groups: Vec<GroupId>,
    pub threat: Threat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    StrikeVulnerableRanged,
    SurroundIsolated,
    OccupyPosition,
    ExploitDivision,
    CounterCharge,
}

/// Move to exploit one opportunity
#[derive(Debug, Clone, Serialize)]
pub struct OpportunityAction {
    pub kind: ActionKind,
    pub priority: f32,
    pub groups: Vec<GroupId>,
    pub opportunity: Opportunity,
}

/// Where a group stands relative to the main infantry body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativePlacement {
    Center,
    Flank,
    AdvancedFlank,
    ProtectedFlank,
    FarFlank,
    BehindCenter,
    BehindFlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormationAdjustment {
    pub shape: Shape,
    pub spacing: Spacing,
    /// Ranks deep
    pub depth: u32,
    pub placement: RelativePlacement,
}

/// Preference weight for attacking one enemy class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPriority {
    pub class: UnitClass,
    pub weight: f32,
}

/// Complete decision output for one faction and cycle
#[derive(Debug, Clone, Serialize)]
pub struct DecisionBundle {
    pub faction: FactionId,
    pub time: MissionTime,
    pub posture: Posture,
    pub overall_situation: f32,
    pub maneuvers: Vec<Maneuver>,
    pub responses: Vec<ThreatResponse>,
    pub actions: Vec<OpportunityAction>,
    pub formations: BTreeMap<UnitClass, FormationAdjustment>,
    pub targets: BTreeMap<UnitClass, Vec<TargetPriority>>,
}

impl DecisionBundle {
    /// Highest threat-response priority, 0 when there are none
    pub fn max_response_priority(&self) -> f32 {
        self.responses
            .iter()
            .map(|r| r.priority)
            .fold(0.0, f32::max)
    }

    pub fn maneuver_kinds(&self) -> Vec<ManeuverKind> {
        self.maneuvers.iter().map(|m| m.kind).collect()
    }

    pub fn has_maneuver(&self, kind: ManeuverKind) -> bool {
        self.maneuvers.iter().any(|m| m.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posture_thresholds() {
        assert_eq!(Posture::from_situation(0.0), Posture::Defensive);
        assert_eq!(Posture::from_situation(0.39), Posture::Defensive);
        assert_eq!(Posture::from_situation(0.40), Posture::Balanced);
        assert_eq!(Posture::from_situation(0.59), Posture::Balanced);
        assert_eq!(Posture::from_situation(0.60), Posture::Offensive);
        assert_eq!(Posture::from_situation(1.0), Posture::Offensive);
    }

    #[test]
    fn test_unexpected_kinds() {
        assert!(ManeuverKind::FeignedRetreat.is_unexpected());
        assert!(!ManeuverKind::FrontalAssault.is_unexpected());
    }
}
