//! Pluggable per-faction tactic table
//!
//! Keys are the stable faction keys reported by the host. A faction with no
//! entry simply gets no signature maneuver and the generic infantry line.

use serde::{Deserialize, Serialize};

use crate::battle::ai::decisions::ManeuverKind;
use crate::battle::groups::{Shape, Spacing, UnitClass};

/// Condition a signature maneuver needs before it is proposed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    /// At least `min_count` units of `class`
    Units { class: UnitClass, min_count: u32 },
    /// Terrain difficulty strictly above `min`
    TerrainDifficulty { min: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureManeuver {
    pub kind: ManeuverKind,
    pub priority: f32,
    pub requirement: Requirement,
}

/// Infantry formation used when the faction attacks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfantryStyle {
    pub shape: Shape,
    pub spacing: Spacing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionTactic {
    pub key: String,
    #[serde(default)]
    pub maneuver: Option<SignatureManeuver>,
    #[serde(default)]
    pub offensive_infantry: Option<InfantryStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionTacticTable {
    #[serde(default)]
    pub entries: Vec<FactionTactic>,
}

impl FactionTacticTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn lookup(&self, key: &str) -> Option<&FactionTactic> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Add or replace the entry for `tactic.key`
    pub fn insert(&mut self, tactic: FactionTactic) {
        match self.entries.iter_mut().find(|e| e.key == tactic.key) {
            Some(existing) => *existing = tactic,
            None => self.entries.push(tactic),
        }
    }
}

fn units(class: UnitClass, min_count: u32) -> Requirement {
    Requirement::Units { class, min_count }
}

fn entry(
    key: &str,
    kind: ManeuverKind,
    priority: f32,
    requirement: Requirement,
    offensive_infantry: Option<InfantryStyle>,
) -> FactionTactic {
    FactionTactic {
        key: key.to_string(),
        maneuver: Some(SignatureManeuver {
            kind,
            priority,
            requirement,
        }),
        offensive_infantry,
    }
}

impl Default for FactionTacticTable {
    fn default() -> Self {
        let loose_line = Some(InfantryStyle {
            shape: Shape::Line,
            spacing: Spacing::Loose,
        });
        Self {
            entries: vec![
                entry(
                    "imperial",
                    ManeuverKind::FormWedge,
                    0.8,
                    units(UnitClass::Infantry, 20),
                    Some(InfantryStyle {
                        shape: Shape::Wedge,
                        spacing: Spacing::Normal,
                    }),
                ),
                entry(
                    "northern",
                    ManeuverKind::ShockInfantryCharge,
                    0.75,
                    units(UnitClass::Infantry, 15),
                    loose_line,
                ),
                entry(
                    "western",
                    ManeuverKind::HeavyCavalryCharge,
                    0.85,
                    units(UnitClass::Cavalry, 10),
                    loose_line,
                ),
                entry(
                    "steppe",
                    ManeuverKind::MountedArcherHarassment,
                    0.9,
                    units(UnitClass::MountedRanged, 8),
                    None,
                ),
                entry(
                    "desert",
                    ManeuverKind::MultiDirectionalAmbush,
                    0.8,
                    Requirement::TerrainDifficulty { min: 0.6 },
                    None,
                ),
                entry(
                    "highland",
                    ManeuverKind::ForestArcherTactics,
                    0.85,
                    units(UnitClass::Ranged, 12),
                    None,
                ),
            ],
        }
    }
}
