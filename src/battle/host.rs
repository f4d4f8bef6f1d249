//! Interfaces to the host simulation
//!
//! The host owns teams, groups and terrain. It exposes them read-only
//! through `BattleHost` and accepts orders through `GroupCommands`.

use ahash::AHashMap;

use crate::battle::groups::{AmbientConditions, GroupOrder, GroupState, IssuedOrder, TeamInfo};
use crate::core::error::Result;
use crate::core::types::{FactionId, GroupId, MissionTime};

/// Read access to the running battle
pub trait BattleHost {
    /// Current mission clock
    fn mission_time(&self) -> MissionTime;

    /// All teams taking part in the engagement
    fn teams(&self) -> Vec<TeamInfo>;

    /// Current state of every group belonging to `faction`, including
    /// emptied ones
    fn groups(&self, faction: FactionId) -> Vec<GroupState>;

    /// Whether two factions fight each other
    fn are_enemies(&self, a: FactionId, b: FactionId) -> bool;

    fn ambient(&self) -> AmbientConditions {
        AmbientConditions::default()
    }
}

/// Sink for group orders
pub trait GroupCommands {
    fn issue(&mut self, group: GroupId, order: GroupOrder) -> Result<()>;
}

impl GroupCommands for Vec<IssuedOrder> {
    fn issue(&mut self, group: GroupId, order: GroupOrder) -> Result<()> {
        self.push(IssuedOrder { group, order });
        Ok(())
    }
}

/// Resolve group ids to their current state
pub trait GroupLookup {
    fn group(&self, id: GroupId) -> Option<&GroupState>;
}

impl GroupLookup for [GroupState] {
    fn group(&self, id: GroupId) -> Option<&GroupState> {
        self.iter().find(|g| g.id == id)
    }
}

impl GroupLookup for Vec<GroupState> {
    fn group(&self, id: GroupId) -> Option<&GroupState> {
        self.as_slice().group(id)
    }
}

impl GroupLookup for AHashMap<GroupId, GroupState> {
    fn group(&self, id: GroupId) -> Option<&GroupState> {
        self.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::groups::UnitClass;
    use glam::{Vec2, Vec3};

    #[test]
    fn test_vec_sink_collects_orders() {
        let mut sink: Vec<IssuedOrder> = Vec::new();
        let id = GroupId::new();
        sink.issue(id, GroupOrder::Charge).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].group, id);
    }

    #[test]
    fn test_slice_lookup() {
        let group = GroupState::new(FactionId(1), UnitClass::Infantry, 10, Vec3::ZERO, Vec2::Y);
        let groups = vec![group];
        assert!(groups.group(group.id).is_some());
        assert!(groups.group(GroupId::new()).is_none());
    }
}
