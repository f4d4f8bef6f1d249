//! Battlefield evaluation: threat/opportunity detection and the overall
//! situation estimate that drives posture.
//!
//! Detection reuses vulnerability scoring for raw severities and values,
//! then classifies each pairing by geometry.

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::battle::groups::{GroupState, UnitClass};
use crate::battle::opportunity::{Opportunity, OpportunityKind};
use crate::battle::snapshot::Snapshot;
use crate::battle::threat::{Threat, ThreatKind};
use crate::battle::vulnerability;
use crate::core::config::TacticsConfig;
use crate::spatial::{direction_to, TerrainQuery};

/// Vulnerability total that maps to severity/value 1.0
pub const SCORE_SCALE: f32 = 4.0;

// Threat classification distances (world units)
const RANGED_REACH: f32 = 150.0;
const AMBUSH_RANGE: f32 = 60.0;
const FLANK_RANGE: f32 = 100.0;
const ASSAULT_RANGE: f32 = 80.0;
const ENCIRCLE_RANGE: f32 = 120.0;
const OVERWHELM_RATIO: f32 = 1.5;

// Opportunity detection
const ISOLATION_GAP: f32 = 90.0;
const DIVISION_GAP: f32 = 100.0;
const HIGH_GROUND_STEP: f32 = 3.0;
const RISE_STEP: f32 = 1.0;
const COUNTER_CHARGE_TRIGGER: f32 = 60.0;
const COUNTER_CHARGE_REACH: f32 = 100.0;
const FLANK_EXPOSURE: f32 = 0.4;
const RANGED_SUPERIORITY: f32 = 1.5;

// Overall situation weights
const STRENGTH_WEIGHT: f32 = 0.6;
const TERRAIN_WEIGHT: f32 = 0.8;
const MOMENTUM_WEIGHT: f32 = 0.7;
/// Height difference between the two sides' centroids that saturates
/// terrain advantage
const TERRAIN_SPAN: f32 = 20.0;

/// Summary scalars handed to the decision policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assessment {
    /// 0 = desperate, 1 = overwhelming; picks the posture
    pub overall_situation: f32,
    /// 0.5 = level with the enemy, above = holding higher ground
    pub terrain_advantage: f32,
    pub strength: f32,
    pub momentum: f32,
}

impl Assessment {
    /// Assessment with fixed situation and terrain values
    pub fn fixed(overall_situation: f32, terrain_advantage: f32) -> Self {
        Self {
            overall_situation,
            terrain_advantage,
            strength: 0.5,
            momentum: 0.5,
        }
    }
}

pub struct BattlefieldEvaluator {
    threat_range: f32,
    opportunity_range: f32,
    adaptability: f32,
}

impl BattlefieldEvaluator {
    pub fn new(config: &TacticsConfig) -> Self {
        Self {
            threat_range: config.detection.max_threat_range,
            opportunity_range: config.detection.max_opportunity_range,
            adaptability: config.commander.adaptability,
        }
    }

    /// Threats enemy groups pose to own groups this cycle
    pub fn detect_threats(&self, snapshot: &Snapshot, terrain: &dyn TerrainQuery) -> Vec<Threat> {
        let mut threats = Vec::new();

        for own in &snapshot.own_groups {
            for enemy in &snapshot.enemy_groups {
                let distance = enemy.distance_to(own);
                if distance > self.threat_range {
                    continue;
                }
                let Some(kind) = classify_threat(enemy, own, distance) else {
                    continue;
                };
                let raw = vulnerability::score(enemy, own, &snapshot.own_groups, terrain).total()
                    / SCORE_SCALE;
                threats.push(Threat::new(enemy, own, kind, raw, snapshot.time));
            }

            if let Some(threat) = self.detect_encirclement(snapshot, own) {
                threats.push(threat);
            }
        }
        threats
    }

    fn detect_encirclement(&self, snapshot: &Snapshot, own: &GroupState) -> Option<Threat> {
        let near: Vec<&GroupState> = snapshot
            .enemy_groups
            .iter()
            .filter(|e| e.distance_to(own) <= ENCIRCLE_RANGE.min(self.threat_range))
            .collect();
        if near.len() < 2 {
            return None;
        }

        let bearings: Vec<Vec2> = near
            .iter()
            .map(|e| direction_to(own.ground(), e.ground()))
            .collect();
        // 120 degrees apart or more
        let surrounded = bearings
            .iter()
            .enumerate()
            .any(|(i, a)| bearings[i + 1..].iter().any(|b| a.dot(*b) <= -0.5));
        if !surrounded {
            return None;
        }

        let nearest = near
            .iter()
            .min_by_key(|e| OrderedFloat(e.distance_to(own)))?;
        let severity = 0.4 + 0.15 * near.len() as f32;
        Some(Threat::new(nearest, own, ThreatKind::Encirclement, severity, snapshot.time))
    }

    /// Opportunities open to own groups this cycle
    pub fn detect_opportunities(
        &self,
        snapshot: &Snapshot,
        terrain: &dyn TerrainQuery,
    ) -> Vec<Opportunity> {
        let mut found = Vec::new();
        self.vulnerable_ranged(snapshot, terrain, &mut found);
        self.isolated_formations(snapshot, &mut found);
        self.enemy_division(snapshot, &mut found);
        self.terrain_positions(snapshot, terrain, &mut found);
        self.counter_charges(snapshot, &mut found);
        self.flanks_and_encirclements(snapshot, &mut found);
        self.ranged_advantage(snapshot, &mut found);
        found
    }

    fn in_range(&self, a: &GroupState, b: &GroupState) -> bool {
        a.distance_to(b) <= self.opportunity_range
    }

    fn nearest_own<'a>(&self, snapshot: &'a Snapshot, to: &GroupState) -> Option<&'a GroupState> {
        snapshot
            .own_groups
            .iter()
            .filter(|g| self.in_range(g, to))
            .min_by_key(|g| OrderedFloat(g.distance_to(to)))
    }

    fn vulnerable_ranged(
        &self,
        snapshot: &Snapshot,
        terrain: &dyn TerrainQuery,
        found: &mut Vec<Opportunity>,
    ) {
        for enemy in snapshot.enemy_groups.iter().filter(|e| e.class.shoots()) {
            let best = snapshot
                .own_groups
                .iter()
                .filter(|own| self.in_range(own, enemy))
                .map(|own| {
                    let total =
                        vulnerability::score(own, enemy, &snapshot.enemy_groups, terrain).total();
                    (own, total)
                })
                .max_by_key(|(_, total)| OrderedFloat(*total));
            if let Some((attacker, total)) = best {
                found.push(Opportunity::new(
                    attacker,
                    Some(enemy),
                    OpportunityKind::VulnerableRanged,
                    total / SCORE_SCALE,
                    snapshot.time,
                ));
            }
        }
    }

    fn isolated_formations(&self, snapshot: &Snapshot, found: &mut Vec<Opportunity>) {
        if snapshot.enemy_groups.len() < 2 {
            return;
        }
        for enemy in &snapshot.enemy_groups {
            let gap = snapshot
                .enemy_groups
                .iter()
                .filter(|other| other.id != enemy.id)
                .map(|other| other.distance_to(enemy))
                .fold(f32::MAX, f32::min);
            if gap < ISOLATION_GAP {
                continue;
            }
            if let Some(source) = self.nearest_own(snapshot, enemy) {
                let value = (gap / vulnerability::ISOLATION_NORMALIZER).min(1.0) * 0.8;
                found.push(Opportunity::new(
                    source,
                    Some(enemy),
                    OpportunityKind::IsolatedFormation,
                    value,
                    snapshot.time,
                ));
            }
        }
    }

    fn enemy_division(&self, snapshot: &Snapshot, found: &mut Vec<Opportunity>) {
        let enemies = &snapshot.enemy_groups;
        let widest = enemies
            .iter()
            .enumerate()
            .flat_map(|(i, a)| enemies[i + 1..].iter().map(move |b| (a, b)))
            .max_by_key(|(a, b)| OrderedFloat(a.distance_to(b)));
        let Some((a, b)) = widest else {
            return;
        };
        let gap = a.distance_to(b);
        if gap <= DIVISION_GAP {
            return;
        }

        // Strike the weaker half of the split
        let target = if a.count <= b.count { a } else { b };
        if let Some(source) = self.nearest_own(snapshot, target) {
            found.push(Opportunity::new(
                source,
                Some(target),
                OpportunityKind::EnemyDivision,
                (gap / 200.0).min(1.0) * 0.8,
                snapshot.time,
            ));
        }
    }

    fn terrain_positions(
        &self,
        snapshot: &Snapshot,
        terrain: &dyn TerrainQuery,
        found: &mut Vec<Opportunity>,
    ) {
        for own in &snapshot.own_groups {
            let nearest_enemy = snapshot
                .enemy_groups
                .iter()
                .filter(|e| self.in_range(own, e))
                .min_by_key(|e| OrderedFloat(e.distance_to(own)));
            let Some(enemy) = nearest_enemy else {
                continue;
            };

            let here = terrain.height_at(own.ground());
            let lead = here - terrain.height_at(enemy.ground());
            if lead > HIGH_GROUND_STEP {
                found.push(Opportunity::new(
                    own,
                    Some(enemy),
                    OpportunityKind::HighGround,
                    lead / 15.0,
                    snapshot.time,
                ));
            }

            if own.class == UnitClass::Infantry {
                let around = terrain
                    .average_surrounding_height(own.ground(), vulnerability::TERRAIN_PROBE_RADIUS);
                let rise = here - around;
                if rise > RISE_STEP {
                    found.push(Opportunity::new(
                        own,
                        Some(enemy),
                        OpportunityKind::DefensivePosition,
                        (rise / 5.0).min(1.0) * 0.7,
                        snapshot.time,
                    ));
                }
            }
        }
    }

    fn counter_charges(&self, snapshot: &Snapshot, found: &mut Vec<Opportunity>) {
        for enemy in snapshot.enemies_of(UnitClass::Cavalry) {
            let pressing = snapshot
                .own_groups
                .iter()
                .any(|own| own.distance_to(enemy) <= COUNTER_CHARGE_TRIGGER);
            if !pressing {
                continue;
            }
            let responder = snapshot
                .own_of(UnitClass::Cavalry)
                .filter(|c| c.distance_to(enemy) <= COUNTER_CHARGE_REACH)
                .min_by_key(|c| OrderedFloat(c.distance_to(enemy)));
            if let Some(cavalry) = responder {
                let closeness = 1.0 - cavalry.distance_to(enemy) / COUNTER_CHARGE_REACH;
                found.push(Opportunity::new(
                    cavalry,
                    Some(enemy),
                    OpportunityKind::CounterCharge,
                    0.5 + 0.5 * closeness,
                    snapshot.time,
                ));
            }
        }
    }

    fn flanks_and_encirclements(&self, snapshot: &Snapshot, found: &mut Vec<Opportunity>) {
        for enemy in &snapshot.enemy_groups {
            let near: Vec<&GroupState> = snapshot
                .own_groups
                .iter()
                .filter(|own| self.in_range(own, enemy))
                .collect();

            // Prefer mounted groups for the flank, closest first
            let flanker = near
                .iter()
                .min_by_key(|g| (!g.class.is_mounted(), OrderedFloat(g.distance_to(enemy))));
            if let Some(flanker) = flanker {
                let toward = direction_to(enemy.ground(), flanker.ground());
                let exposure = (1.0 - enemy.facing.dot(toward)) / 2.0;
                if exposure > FLANK_EXPOSURE {
                    let reach = 1.0 - 0.5 * flanker.distance_to(enemy) / self.opportunity_range;
                    found.push(Opportunity::new(
                        flanker,
                        Some(enemy),
                        OpportunityKind::Flanking,
                        exposure * reach,
                        snapshot.time,
                    ));
                }
            }

            if near.len() >= 2 {
                let bearings: Vec<Vec2> = near
                    .iter()
                    .map(|g| direction_to(enemy.ground(), g.ground()))
                    .collect();
                let converging = bearings
                    .iter()
                    .enumerate()
                    .any(|(i, a)| bearings[i + 1..].iter().any(|b| a.dot(*b) <= 0.0));
                let source = near
                    .iter()
                    .min_by_key(|g| OrderedFloat(g.distance_to(enemy)));
                if let (true, Some(source)) = (converging, source) {
                    let value = (0.6 + 0.1 * (near.len() - 2) as f32).min(1.0);
                    found.push(Opportunity::new(
                        source,
                        Some(enemy),
                        OpportunityKind::Encirclement,
                        value,
                        snapshot.time,
                    ));
                }
            }
        }
    }

    fn ranged_advantage(&self, snapshot: &Snapshot, found: &mut Vec<Opportunity>) {
        let Some(archers) = snapshot.main_group(UnitClass::Ranged) else {
            return;
        };
        let enemy_in_reach = snapshot.enemy_groups.iter().any(|e| self.in_range(archers, e));
        if !enemy_in_reach {
            return;
        }
        let own = snapshot.own_count(UnitClass::Ranged) as f32;
        let theirs = (snapshot.enemy_count(UnitClass::Ranged)
            + snapshot.enemy_count(UnitClass::MountedRanged)) as f32;
        let value = if theirs == 0.0 {
            0.8
        } else if own >= theirs * RANGED_SUPERIORITY {
            ((own / theirs - 1.0) / 3.0).min(1.0)
        } else {
            return;
        };
        found.push(Opportunity::new(
            archers,
            None,
            OpportunityKind::RangedAdvantage,
            value,
            snapshot.time,
        ));
    }

    /// Overall situation from strength, terrain and tracked threats and
    /// opportunities (the snapshot must already carry them)
    pub fn assess(&self, snapshot: &Snapshot, terrain: &dyn TerrainQuery) -> Assessment {
        let strength = (snapshot.advantage + 1.0) / 2.0;
        let terrain_advantage = terrain_advantage(snapshot, terrain);

        let best_opportunity = snapshot
            .opportunities
            .iter()
            .map(|o| o.value())
            .fold(0.0, f32::max);
        let worst_threat = snapshot
            .threats
            .iter()
            .map(|t| t.severity())
            .fold(0.0, f32::max);
        let momentum =
            (0.5 + 0.5 * self.adaptability * (best_opportunity - worst_threat)).clamp(0.0, 1.0);

        let weighted = STRENGTH_WEIGHT * strength
            + TERRAIN_WEIGHT * terrain_advantage
            + MOMENTUM_WEIGHT * momentum;
        let overall_situation =
            (weighted / (STRENGTH_WEIGHT + TERRAIN_WEIGHT + MOMENTUM_WEIGHT)).clamp(0.0, 1.0);

        Assessment {
            overall_situation,
            terrain_advantage,
            strength,
            momentum,
        }
    }
}

/// Classify an enemy-to-own pairing, or `None` when it is not a threat
fn classify_threat(enemy: &GroupState, own: &GroupState, distance: f32) -> Option<ThreatKind> {
    let enemy_facing_own = enemy.facing.dot(direction_to(enemy.ground(), own.ground())) > 0.5;
    let bearing = own.facing.dot(direction_to(own.ground(), enemy.ground()));

    if enemy.class == UnitClass::Cavalry && enemy_facing_own {
        Some(ThreatKind::CavalryCharge)
    } else if enemy.class.shoots() && distance <= RANGED_REACH {
        Some(ThreatKind::RangedFire)
    } else if bearing < -0.5 && distance <= AMBUSH_RANGE {
        Some(ThreatKind::Ambush)
    } else if bearing.abs() < 0.5 && distance <= FLANK_RANGE {
        Some(ThreatKind::Flanking)
    } else if enemy.class == UnitClass::Infantry
        && enemy.count as f32 > own.count as f32 * OVERWHELM_RATIO
    {
        Some(ThreatKind::InfantryOverwhelm)
    } else if enemy.class == UnitClass::Infantry && enemy_facing_own && distance <= ASSAULT_RANGE {
        Some(ThreatKind::FrontalAssault)
    } else {
        None
    }
}

fn terrain_advantage(snapshot: &Snapshot, terrain: &dyn TerrainQuery) -> f32 {
    match (snapshot.own_centroid(), snapshot.enemy_centroid()) {
        (Some(own), Some(enemy)) => {
            let lead = terrain.height_at(own) - terrain.height_at(enemy);
            (0.5 + lead / TERRAIN_SPAN).clamp(0.0, 1.0)
        }
        _ => 0.5,
    }
}
