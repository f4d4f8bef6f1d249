//! Tactical AI for battle factions
//!
//! Architecture: rules + data
//! - `DecisionPolicy` turns a snapshot and assessment into a `DecisionBundle`
//! - `FactionTacticTable` holds TOML-loaded faction signatures
//! - `Executor` gates bundles and dispatches each kind to its handler
//! - `TacticalBrain` owns per-faction state and drives the tick loop

pub mod brain;
pub mod decisions;
pub mod executor;
pub mod faction_tactics;
pub mod formations;
pub mod handlers;
pub mod maneuvers;
pub mod placement;
pub mod policy;
pub mod responses;
pub mod stabilizer;
pub mod variation;

pub use brain::{CycleReport, FactionContext, FactionFailure, TacticalBrain, TickReport};
pub use decisions::{
    ActionKind, DecisionBundle, FormationAdjustment, Maneuver, ManeuverKind, OpportunityAction,
    Posture, RelativePlacement, ResponseKind, TargetPriority, ThreatResponse,
};
pub use executor::{Directive, ExecutionOutcome, Executor, OrderContext};
pub use faction_tactics::{FactionTactic, FactionTacticTable};
pub use policy::DecisionPolicy;
pub use stabilizer::{GateState, GateVerdict, StabilizationGate};
