//! In-memory battle host for the runner and integration tests
//!
//! Orders take effect the way a simple host would apply them: formation
//! changes at once, movement by straight-line travel during `advance`.
//! There is no pathfinding and no combat; casualties are scripted with
//! `set_count`.

use ahash::AHashMap;
use glam::{Vec2, Vec3};
use ordered_float::OrderedFloat;

use crate::battle::groups::{AmbientConditions, GroupOrder, GroupState, IssuedOrder, TeamInfo, UnitClass};
use crate::battle::host::{BattleHost, GroupCommands};
use crate::core::error::{Result, TacticsError};
use crate::core::types::{FactionId, GroupId, MissionTime};
use crate::spatial::{direction_to, HeightField, TerrainQuery};

/// A charging group stops this close to its target
const CONTACT_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, Copy)]
enum Movement {
    To(Vec2),
    Charge(GroupId),
}

/// Scripted battle host
#[derive(Debug, Clone)]
pub struct SandboxBattle {
    time: MissionTime,
    teams: Vec<TeamInfo>,
    /// Insertion order is kept so runs are reproducible
    groups: Vec<GroupState>,
    terrain: HeightField,
    ambient: AmbientConditions,
    alliances: Vec<(FactionId, FactionId)>,
    movement: AHashMap<GroupId, Movement>,
    speed: AHashMap<GroupId, f32>,
}

impl SandboxBattle {
    pub fn new(terrain: HeightField) -> Self {
        Self {
            time: 0.0,
            teams: Vec::new(),
            groups: Vec::new(),
            terrain,
            ambient: AmbientConditions::default(),
            alliances: Vec::new(),
            movement: AHashMap::new(),
            speed: AHashMap::new(),
        }
    }

    pub fn with_ambient(mut self, ambient: AmbientConditions) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn add_team(&mut self, team: TeamInfo) {
        self.teams.push(team);
    }

    /// Add a group, snapping it onto the terrain and counting it towards
    /// its team's starting strength
    pub fn add_group(&mut self, mut group: GroupState) -> GroupId {
        group.position = self.terrain.surface(group.ground());
        if let Some(team) = self.teams.iter_mut().find(|t| t.faction == group.faction) {
            team.initial_count += group.count;
        }
        self.groups.push(group);
        group.id
    }

    pub fn set_allied(&mut self, a: FactionId, b: FactionId) {
        self.alliances.push((a, b));
    }

    pub fn terrain(&self) -> &HeightField {
        &self.terrain
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupState> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn all_groups(&self) -> &[GroupState] {
        &self.groups
    }

    /// Scripted casualties
    pub fn set_count(&mut self, id: GroupId, count: u32) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == id) {
            group.count = count;
        }
    }

    /// Hand a batch of buffered orders to the groups
    pub fn apply(&mut self, orders: &[IssuedOrder]) -> Result<()> {
        for order in orders {
            self.issue(order.group, order.order)?;
        }
        Ok(())
    }

    /// Advance the clock by `dt` seconds and move every group with a
    /// pending destination or charge.
    pub fn advance(&mut self, dt: f32) {
        self.time += dt;

        for index in 0..self.groups.len() {
            let group = self.groups[index];
            if !group.is_active() {
                self.movement.remove(&group.id);
                continue;
            }
            let Some(movement) = self.movement.get(&group.id).copied() else {
                continue;
            };
            let (goal, stop_at) = match movement {
                Movement::To(point) => (point, 0.0),
                Movement::Charge(target) => match self.group(target) {
                    Some(t) if t.is_active() => (t.ground(), CONTACT_DISTANCE),
                    _ => {
                        self.movement.remove(&group.id);
                        continue;
                    }
                },
            };

            let speed = group.class.assumed_speed() * self.speed.get(&group.id).copied().unwrap_or(1.0);
            let remaining = group.ground().distance(goal) - stop_at;
            let step = speed * dt;
            let dir = direction_to(group.ground(), goal);

            let next = if remaining <= step {
                if matches!(movement, Movement::To(_)) {
                    self.movement.remove(&group.id);
                }
                group.ground() + dir * remaining.max(0.0)
            } else {
                group.ground() + dir * step
            };

            let moved = &mut self.groups[index];
            moved.position = self.terrain.surface(next);
            if dir != Vec2::ZERO {
                moved.facing = dir;
            }
        }
    }

    /// True while any group is still travelling
    pub fn is_moving(&self) -> bool {
        !self.movement.is_empty()
    }

    fn nearest_enemy_of(&self, group: &GroupState) -> Option<GroupId> {
        self.groups
            .iter()
            .filter(|g| g.is_active() && self.are_enemies(group.faction, g.faction))
            .min_by_key(|g| OrderedFloat(g.distance_to(group)))
            .map(|g| g.id)
    }
}

impl BattleHost for SandboxBattle {
    fn mission_time(&self) -> MissionTime {
        self.time
    }

    fn teams(&self) -> Vec<TeamInfo> {
        self.teams.clone()
    }

    fn groups(&self, faction: FactionId) -> Vec<GroupState> {
        self.groups
            .iter()
            .filter(|g| g.faction == faction)
            .copied()
            .collect()
    }

    fn are_enemies(&self, a: FactionId, b: FactionId) -> bool {
        a != b
            && !self
                .alliances
                .iter()
                .any(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
    }

    fn ambient(&self) -> AmbientConditions {
        self.ambient
    }
}

impl GroupCommands for SandboxBattle {
    fn issue(&mut self, group: GroupId, order: GroupOrder) -> Result<()> {
        let Some(index) = self.groups.iter().position(|g| g.id == group) else {
            return Err(TacticsError::CommandRejected {
                group,
                reason: "no such group".into(),
            });
        };

        match order {
            GroupOrder::SetShape(shape) => self.groups[index].shape = shape,
            GroupOrder::SetSpacing(spacing) => self.groups[index].spacing = spacing,
            GroupOrder::SetWidth(files) => {
                let target = &mut self.groups[index];
                let files = files.max(1) as f32;
                target.width = files * 1.5 * target.spacing.multiplier();
                target.depth = (target.count as f32 / files).ceil().max(1.0) * 1.5;
            }
            GroupOrder::MoveTo(point) => {
                self.movement.insert(group, Movement::To(point.truncate()));
            }
            GroupOrder::Charge => {
                let charger = self.groups[index];
                match self.nearest_enemy_of(&charger) {
                    Some(target) => {
                        self.movement.insert(group, Movement::Charge(target));
                    }
                    None => {
                        self.movement.remove(&group);
                    }
                }
            }
            GroupOrder::Face(direction) => {
                let direction = direction.normalize_or_zero();
                if direction != Vec2::ZERO {
                    self.groups[index].facing = direction;
                }
            }
            GroupOrder::SetFire(policy) => self.groups[index].fire = policy,
            GroupOrder::SetSpeed(multiplier) => {
                self.speed.insert(group, multiplier.max(0.0));
            }
        }
        Ok(())
    }
}

/// Two AI factions facing each other across a shallow valley with a low
/// hill on the western side.
///
/// Faction 1 ("imperial") fields shielded infantry, archers and cavalry;
/// faction 2 ("steppe") fields horse archers, cavalry and spearmen.
pub fn border_skirmish() -> SandboxBattle {
    let terrain = HeightField::from_fn(Vec2::new(-300.0, -300.0), 10.0, 61, 61, |p| {
        let hill = (-(p - Vec2::new(-120.0, 40.0)).length_squared() / 6000.0).exp() * 12.0;
        hill + p.y.abs() * 0.01
    });
    let mut battle = SandboxBattle::new(terrain);

    let west = FactionId(1);
    let east = FactionId(2);
    battle.add_team(TeamInfo::new(west, "imperial", 0));
    let mut steppe = TeamInfo::new(east, "steppe", 0);
    steppe.has_leader = true;
    battle.add_team(steppe);

    let at = |x: f32, y: f32| Vec3::new(x, y, 0.0);
    battle.add_group(GroupState::new(west, UnitClass::Infantry, 40, at(-80.0, 0.0), Vec2::X).with_shields());
    battle.add_group(GroupState::new(west, UnitClass::Ranged, 24, at(-95.0, 0.0), Vec2::X));
    battle.add_group(GroupState::new(west, UnitClass::Cavalry, 12, at(-85.0, 40.0), Vec2::X));

    battle.add_group(GroupState::new(east, UnitClass::MountedRanged, 16, at(90.0, -30.0), Vec2::NEG_X));
    battle.add_group(GroupState::new(east, UnitClass::Cavalry, 18, at(95.0, 30.0), Vec2::NEG_X));
    battle.add_group(GroupState::new(east, UnitClass::Infantry, 30, at(110.0, 0.0), Vec2::NEG_X).with_spears());

    battle
}
