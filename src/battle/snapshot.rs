//! Per-faction battlefield snapshot
//!
//! Rebuilt from scratch every cycle: groups are re-read from the host,
//! emptied groups are dropped, and the tracked threats and opportunities
//! are copied in after the threat board has been refreshed.

use glam::Vec2;
use serde::Serialize;

use crate::battle::groups::{AmbientConditions, GroupState, UnitClass};
use crate::battle::host::{BattleHost, GroupLookup};
use crate::battle::opportunity::Opportunity;
use crate::battle::threat::Threat;
use crate::battle::tracking::ThreatBoard;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{FactionId, GroupId, MissionTime};
use crate::spatial::TerrainQuery;

/// Safety margin applied to the outermost group offset
pub const EXTENT_MARGIN: f32 = 2.5;
/// Battle extent used when no group is on the field
pub const DEFAULT_EXTENT: f32 = 500.0;
/// Height standard deviation that counts as maximally difficult terrain
const DIFFICULTY_NORMALIZER: f32 = 10.0;
const DIFFICULTY_GRID: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub faction: FactionId,
    /// Faction tactic table key
    pub key: String,
    pub time: MissionTime,
    pub own_groups: Vec<GroupState>,
    pub enemy_groups: Vec<GroupState>,
    /// Unit-weighted centroid of every group on the field
    pub center: Vec2,
    pub width: f32,
    pub depth: f32,
    /// 0 = level ground, 1 = very broken ground
    pub terrain_difficulty: f32,
    /// Mean casualty ratio of both sides, 0..=1
    pub progress: f32,
    /// Relative strength, -1..=1
    pub advantage: f32,
    pub threats: Vec<Threat>,
    pub opportunities: Vec<Opportunity>,
    pub ambient: AmbientConditions,
}

impl Snapshot {
    /// Read the faction's view of the battle from the host
    pub fn capture(
        host: &dyn BattleHost,
        terrain: &dyn TerrainQuery,
        faction: FactionId,
    ) -> Result<Self> {
        let teams = host.teams();
        let own_team = teams
            .iter()
            .find(|t| t.faction == faction)
            .ok_or(TacticsError::UnknownFaction(faction))?;

        let mut builder = SnapshotBuilder::new(faction)
            .key(own_team.key.clone())
            .time(host.mission_time())
            .ambient(host.ambient())
            .own_groups(host.groups(faction));

        let mut enemy_initial = 0;
        for team in teams
            .iter()
            .filter(|t| t.faction != faction && host.are_enemies(faction, t.faction))
        {
            enemy_initial += team.initial_count;
            builder = builder.enemy_groups(host.groups(team.faction));
        }

        Ok(builder
            .initial_counts(own_team.initial_count, enemy_initial)
            .build(terrain))
    }

    /// Copy the board's live threats and opportunities into the snapshot
    pub fn attach(&mut self, board: &ThreatBoard) {
        self.threats = board.active_threats().cloned().collect();
        self.opportunities = board.active_opportunities().cloned().collect();
    }

    pub fn own_of(&self, class: UnitClass) -> impl Iterator<Item = &GroupState> + '_ {
        self.own_groups.iter().filter(move |g| g.class == class)
    }

    pub fn enemies_of(&self, class: UnitClass) -> impl Iterator<Item = &GroupState> + '_ {
        self.enemy_groups.iter().filter(move |g| g.class == class)
    }

    /// Own units of one class
    pub fn own_count(&self, class: UnitClass) -> u32 {
        self.own_of(class).map(|g| g.count).sum()
    }

    pub fn enemy_count(&self, class: UnitClass) -> u32 {
        self.enemies_of(class).map(|g| g.count).sum()
    }

    pub fn own_strength(&self) -> u32 {
        self.own_groups.iter().map(|g| g.count).sum()
    }

    pub fn enemy_strength(&self) -> u32 {
        self.enemy_groups.iter().map(|g| g.count).sum()
    }

    /// Ids of own groups of one class
    pub fn own_ids(&self, class: UnitClass) -> Vec<GroupId> {
        self.own_of(class).map(|g| g.id).collect()
    }

    pub fn all_own_ids(&self) -> Vec<GroupId> {
        self.own_groups.iter().map(|g| g.id).collect()
    }

    /// Largest own group of a class
    pub fn main_group(&self, class: UnitClass) -> Option<&GroupState> {
        self.own_of(class).max_by_key(|g| g.count)
    }

    pub fn own_centroid(&self) -> Option<Vec2> {
        weighted_centroid(&self.own_groups)
    }

    pub fn enemy_centroid(&self) -> Option<Vec2> {
        weighted_centroid(&self.enemy_groups)
    }

    /// Any own infantry carries shields
    pub fn infantry_has_shields(&self) -> bool {
        self.own_of(UnitClass::Infantry).any(|g| g.has_shield)
    }

    /// Any own infantry carries spears
    pub fn infantry_has_spears(&self) -> bool {
        self.own_of(UnitClass::Infantry).any(|g| g.has_spear)
    }

    pub fn is_own(&self, id: GroupId) -> bool {
        self.own_groups.iter().any(|g| g.id == id)
    }
}

impl GroupLookup for Snapshot {
    fn group(&self, id: GroupId) -> Option<&GroupState> {
        self.own_groups
            .iter()
            .chain(self.enemy_groups.iter())
            .find(|g| g.id == id)
    }
}

/// Assembles a `Snapshot` from group lists
pub struct SnapshotBuilder {
    faction: FactionId,
    key: String,
    time: MissionTime,
    own: Vec<GroupState>,
    enemy: Vec<GroupState>,
    own_initial: Option<u32>,
    enemy_initial: Option<u32>,
    ambient: AmbientConditions,
}

impl SnapshotBuilder {
    pub fn new(faction: FactionId) -> Self {
        Self {
            faction,
            key: String::new(),
            time: 0.0,
            own: Vec::new(),
            enemy: Vec::new(),
            own_initial: None,
            enemy_initial: None,
            ambient: AmbientConditions::default(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn time(mut self, time: MissionTime) -> Self {
        self.time = time;
        self
    }

    pub fn ambient(mut self, ambient: AmbientConditions) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn own_groups(mut self, groups: impl IntoIterator<Item = GroupState>) -> Self {
        self.own.extend(groups);
        self
    }

    pub fn enemy_groups(mut self, groups: impl IntoIterator<Item = GroupState>) -> Self {
        self.enemy.extend(groups);
        self
    }

    /// Unit counts at engagement start; default to the current counts
    pub fn initial_counts(mut self, own: u32, enemy: u32) -> Self {
        self.own_initial = Some(own);
        self.enemy_initial = Some(enemy);
        self
    }

    pub fn build(self, terrain: &dyn TerrainQuery) -> Snapshot {
        let own_groups: Vec<GroupState> = self.own.into_iter().filter(|g| g.is_active()).collect();
        let enemy_groups: Vec<GroupState> =
            self.enemy.into_iter().filter(|g| g.is_active()).collect();

        let own_active: u32 = own_groups.iter().map(|g| g.count).sum();
        let enemy_active: u32 = enemy_groups.iter().map(|g| g.count).sum();

        let all: Vec<GroupState> = own_groups.iter().chain(enemy_groups.iter()).copied().collect();
        let center = weighted_centroid(&all).unwrap_or(Vec2::ZERO);
        let (width, depth) = extents(&all, center);

        let own_ratio = casualty_ratio(self.own_initial.unwrap_or(own_active), own_active);
        let enemy_ratio = casualty_ratio(self.enemy_initial.unwrap_or(enemy_active), enemy_active);

        Snapshot {
            faction: self.faction,
            key: self.key,
            time: self.time,
            center,
            width,
            depth,
            terrain_difficulty: terrain_difficulty(terrain, center, width, depth),
            progress: (own_ratio + enemy_ratio) / 2.0,
            advantage: relative_advantage(own_active, enemy_active),
            own_groups,
            enemy_groups,
            threats: Vec::new(),
            opportunities: Vec::new(),
            ambient: self.ambient,
        }
    }
}

/// Unit-count weighted centroid of non-empty groups
pub fn weighted_centroid(groups: &[GroupState]) -> Option<Vec2> {
    let total: u32 = groups.iter().map(|g| g.count).sum();
    if total == 0 {
        return None;
    }
    let sum = groups
        .iter()
        .fold(Vec2::ZERO, |acc, g| acc + g.ground() * g.count as f32);
    Some(sum / total as f32)
}

/// (own − enemy) / (own + enemy), 0 when both are empty
pub fn relative_advantage(own: u32, enemy: u32) -> f32 {
    let total = own + enemy;
    if total == 0 {
        return 0.0;
    }
    (own as f32 - enemy as f32) / total as f32
}

/// Fraction of the starting force lost; a side with no starting count
/// reads as wiped out
pub fn casualty_ratio(initial: u32, active: u32) -> f32 {
    if initial == 0 {
        return 1.0;
    }
    (1.0 - active as f32 / initial as f32).clamp(0.0, 1.0)
}

fn extents(groups: &[GroupState], center: Vec2) -> (f32, f32) {
    if groups.is_empty() {
        return (DEFAULT_EXTENT, DEFAULT_EXTENT);
    }
    let max_offset = groups
        .iter()
        .map(|g| (g.ground() - center).abs())
        .fold(Vec2::ZERO, Vec2::max);
    (max_offset.x * EXTENT_MARGIN, max_offset.y * EXTENT_MARGIN)
}

fn terrain_difficulty(terrain: &dyn TerrainQuery, center: Vec2, width: f32, depth: f32) -> f32 {
    let steps = (DIFFICULTY_GRID - 1) as f32;
    let origin = center - Vec2::new(width, depth) * 0.5;
    let samples: Vec<f32> = (0..DIFFICULTY_GRID)
        .flat_map(|i| (0..DIFFICULTY_GRID).map(move |j| (i, j)))
        .map(|(i, j)| {
            let offset = Vec2::new(width * i as f32 / steps, depth * j as f32 / steps);
            terrain.height_at(origin + offset)
        })
        .collect();

    let n = samples.len() as f32;
    let mean = samples.iter().sum::<f32>() / n;
    let variance = samples.iter().map(|h| (h - mean).powi(2)).sum::<f32>() / n;
    (variance.sqrt() / DIFFICULTY_NORMALIZER).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{FlatTerrain, HeightField};
    use glam::Vec3;

    fn group(faction: u32, class: UnitClass, count: u32, x: f32, y: f32) -> GroupState {
        GroupState::new(FactionId(faction), class, count, Vec3::new(x, y, 0.0), Vec2::X)
    }

    #[test]
    fn test_center_and_advantage() {
        let snapshot = SnapshotBuilder::new(FactionId(1))
            .own_groups([group(1, UnitClass::Infantry, 30, 0.0, 0.0)])
            .enemy_groups([group(2, UnitClass::Infantry, 10, 100.0, 0.0)])
            .build(&FlatTerrain::default());

        assert!((snapshot.center - Vec2::new(25.0, 0.0)).length() < 1e-4);
        assert!((snapshot.advantage - 0.5).abs() < 1e-6);
        // Offsets are 25 and 75 on x
        assert!((snapshot.width - 187.5).abs() < 1e-3);
        assert_eq!(snapshot.depth, 0.0);
    }

    #[test]
    fn test_empty_groups_dropped() {
        let snapshot = SnapshotBuilder::new(FactionId(1))
            .own_groups([
                group(1, UnitClass::Infantry, 30, 0.0, 0.0),
                group(1, UnitClass::Cavalry, 0, 10.0, 0.0),
            ])
            .build(&FlatTerrain::default());
        assert_eq!(snapshot.own_groups.len(), 1);
        assert_eq!(snapshot.own_count(UnitClass::Cavalry), 0);
    }

    #[test]
    fn test_empty_field_defaults() {
        let snapshot = SnapshotBuilder::new(FactionId(1)).build(&FlatTerrain::default());
        assert_eq!(snapshot.center, Vec2::ZERO);
        assert_eq!(snapshot.width, DEFAULT_EXTENT);
        assert_eq!(snapshot.advantage, 0.0);
        // Both sides "wiped" when there was never anyone
        assert_eq!(snapshot.progress, 1.0);
    }

    #[test]
    fn test_progress_from_casualties() {
        let snapshot = SnapshotBuilder::new(FactionId(1))
            .own_groups([group(1, UnitClass::Infantry, 50, 0.0, 0.0)])
            .enemy_groups([group(2, UnitClass::Infantry, 25, 100.0, 0.0)])
            .initial_counts(100, 100)
            .build(&FlatTerrain::default());
        // own lost 50%, enemy lost 75%
        assert!((snapshot.progress - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_casualty_ratio_edges() {
        assert_eq!(casualty_ratio(0, 0), 1.0);
        assert_eq!(casualty_ratio(10, 0), 1.0);
        assert_eq!(casualty_ratio(10, 10), 0.0);
        assert_eq!(casualty_ratio(10, 15), 0.0);
    }

    #[test]
    fn test_terrain_difficulty() {
        let flat = SnapshotBuilder::new(FactionId(1))
            .own_groups([group(1, UnitClass::Infantry, 30, 0.0, 0.0)])
            .enemy_groups([group(2, UnitClass::Infantry, 30, 200.0, 200.0)])
            .build(&FlatTerrain { height: 3.0 });
        assert_eq!(flat.terrain_difficulty, 0.0);

        let rough = HeightField::from_fn(Vec2::splat(-300.0), 10.0, 81, 81, |p| {
            if (p.x / 50.0).floor() as i32 % 2 == 0 { 0.0 } else { 30.0 }
        });
        let broken = SnapshotBuilder::new(FactionId(1))
            .own_groups([group(1, UnitClass::Infantry, 30, 0.0, 0.0)])
            .enemy_groups([group(2, UnitClass::Infantry, 30, 200.0, 200.0)])
            .build(&rough);
        assert!(broken.terrain_difficulty > 0.5);
    }

    #[test]
    fn test_lookup_covers_both_sides() {
        let own = group(1, UnitClass::Infantry, 30, 0.0, 0.0);
        let enemy = group(2, UnitClass::Ranged, 30, 50.0, 0.0);
        let snapshot = SnapshotBuilder::new(FactionId(1))
            .own_groups([own])
            .enemy_groups([enemy])
            .build(&FlatTerrain::default());
        assert!(snapshot.group(own.id).is_some());
        assert!(snapshot.group(enemy.id).is_some());
        assert!(snapshot.is_own(own.id));
        assert!(!snapshot.is_own(enemy.id));
    }
}
