//! Alert decisions.
//!
//! - `fire` : the persistent fire alert state machine.
//! - `stalenesses` : quiet-sensor detection applied before reduction.

pub mod fire;
pub mod stalenesses;
