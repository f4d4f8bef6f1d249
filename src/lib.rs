//! Field Marshal - tactical decision engine for autonomous battle factions
//!
//! Each AI faction reads the battle from a host, weighs threats and
//! opportunities, picks a posture and maneuvers, and sends group orders
//! back through a stabilization gate.

pub mod battle;
pub mod core;
pub mod spatial;
