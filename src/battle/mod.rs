//! Battle layer: host-facing group model, battlefield reading and the
//! tactical AI
//!
//! Data flows one way per faction and cycle:
//! - `Snapshot` captures the faction's view from the host
//! - `BattlefieldEvaluator` detects threats and opportunities and scores
//!   the overall situation
//! - `ThreatBoard` keeps them alive across cycles
//! - `ai` decides and executes

pub mod ai;
pub mod evaluator;
pub mod groups;
pub mod host;
pub mod opportunity;
pub mod sandbox;
pub mod snapshot;
pub mod threat;
pub mod tracking;
pub mod vulnerability;

// Re-exports for convenient access
pub use evaluator::{Assessment, BattlefieldEvaluator};
pub use groups::{
    AmbientConditions, FirePolicy, GroupOrder, GroupState, IssuedOrder, Shape, Spacing, TeamInfo,
    TimeOfDay, UnitClass, Weather,
};
pub use host::{BattleHost, GroupCommands, GroupLookup};
pub use opportunity::{Opportunity, OpportunityKind};
pub use sandbox::{border_skirmish, SandboxBattle};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use threat::{Threat, ThreatKind};
pub use tracking::ThreatBoard;
pub use vulnerability::{most_vulnerable, VulnerabilityScore};
