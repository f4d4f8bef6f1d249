//! Host-facing group model
//!
//! Groups are owned by the host simulation. The tactical layer only sees
//! `GroupState` copies re-read every cycle and answers with `GroupOrder`s.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::types::{FactionId, GroupId};

/// Unit-type class of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitClass {
    Infantry,
    Ranged,
    Cavalry,
    MountedRanged,
}

impl UnitClass {
    pub const ALL: [UnitClass; 4] = [
        UnitClass::Infantry,
        UnitClass::Ranged,
        UnitClass::Cavalry,
        UnitClass::MountedRanged,
    ];

    /// Cavalry and mounted ranged
    pub fn is_mounted(self) -> bool {
        matches!(self, UnitClass::Cavalry | UnitClass::MountedRanged)
    }

    /// Ranged and mounted ranged
    pub fn shoots(self) -> bool {
        matches!(self, UnitClass::Ranged | UnitClass::MountedRanged)
    }

    /// Assumed closing speed used for time-to-impact estimates
    pub fn assumed_speed(self) -> f32 {
        match self {
            UnitClass::Cavalry => 8.0,
            UnitClass::MountedRanged => 7.0,
            UnitClass::Infantry => 3.0,
            UnitClass::Ranged => 2.5,
        }
    }
}

/// Formation arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Line,
    Column,
    Square,
    Circle,
    Wedge,
    ShieldWall,
    SpearWall,
    Scatter,
}

impl Shape {
    /// Shapes presenting a broad front (shield and spear walls are lines)
    pub fn is_line(self) -> bool {
        matches!(self, Shape::Line | Shape::ShieldWall | Shape::SpearWall)
    }
}

/// Discrete spacing tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spacing {
    VeryTight,
    Tight,
    Normal,
    Loose,
    VeryLoose,
}

impl Spacing {
    /// Numeric multiplier the host applies to unit spacing
    pub fn multiplier(self) -> f32 {
        match self {
            Spacing::VeryTight => 0.5,
            Spacing::Tight => 0.8,
            Spacing::Normal => 1.0,
            Spacing::Loose => 1.3,
            Spacing::VeryLoose => 1.8,
        }
    }
}

/// Fire policy for shooting groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FirePolicy {
    Hold,
    FireAtWill,
}

/// Read-only view of one group for the current cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroupState {
    pub id: GroupId,
    pub faction: FactionId,
    pub class: UnitClass,
    pub count: u32,
    /// Ground plane in x/y, height in z
    pub position: Vec3,
    /// Unit facing on the ground plane
    pub facing: Vec2,
    pub shape: Shape,
    pub spacing: Spacing,
    pub fire: FirePolicy,
    /// Frontage in world units
    pub width: f32,
    /// Rank depth in world units
    pub depth: f32,
    pub has_shield: bool,
    pub has_spear: bool,
}

impl GroupState {
    /// New group in a default line at `position` facing `facing`
    pub fn new(faction: FactionId, class: UnitClass, count: u32, position: Vec3, facing: Vec2) -> Self {
        let ranks = 3.0;
        let files = (count as f32 / ranks).max(1.0);
        Self {
            id: GroupId::new(),
            faction,
            class,
            count,
            position,
            facing: facing.normalize_or_zero(),
            shape: Shape::Line,
            spacing: Spacing::Normal,
            fire: FirePolicy::Hold,
            width: files * 1.5,
            depth: ranks * 1.5,
            has_shield: false,
            has_spear: false,
        }
    }

    pub fn with_shields(mut self) -> Self {
        self.has_shield = true;
        self
    }

    pub fn with_spears(mut self) -> Self {
        self.has_spear = true;
        self
    }

    /// Ground-plane position
    pub fn ground(&self) -> Vec2 {
        self.position.truncate()
    }

    pub fn is_active(&self) -> bool {
        self.count > 0
    }

    pub fn distance_to(&self, other: &GroupState) -> f32 {
        self.ground().distance(other.ground())
    }
}

/// Per-team metadata from the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInfo {
    pub faction: FactionId,
    /// Key into the faction tactic table
    pub key: String,
    pub is_valid: bool,
    pub is_player: bool,
    /// Units present at engagement start
    pub initial_count: u32,
    /// Whether the team has a commanding leader
    pub has_leader: bool,
    /// Leader tactics skill in 0..=1, when the host tracks one
    pub leader_skill: Option<f32>,
}

impl TeamInfo {
    pub fn new(faction: FactionId, key: impl Into<String>, initial_count: u32) -> Self {
        Self {
            faction,
            key: key.into(),
            is_valid: true,
            is_player: false,
            initial_count,
            has_leader: false,
            leader_skill: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Cloudy,
    Rainy,
    Foggy,
    Snowy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeOfDay {
    Dawn,
    Morning,
    #[default]
    Noon,
    Afternoon,
    Dusk,
    Night,
}

/// Informational battle conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmbientConditions {
    pub weather: Weather,
    pub time_of_day: TimeOfDay,
}

/// Abstract order sent to the host for one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GroupOrder {
    SetShape(Shape),
    SetSpacing(Spacing),
    /// Files across; depth is expressed through width = count / depth
    SetWidth(u32),
    MoveTo(Vec3),
    Charge,
    /// Face along a ground-plane direction
    Face(Vec2),
    SetFire(FirePolicy),
    /// Movement speed multiplier
    SetSpeed(f32),
}

/// An order addressed to a group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IssuedOrder {
    pub group: GroupId,
    pub order: GroupOrder,
}
