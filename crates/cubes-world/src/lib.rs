//! Shared world state for the cube simulation.
//!
//! - [`registry`] -- the world-state registry with coalesced pub/sub
//! - [`attention`] -- interest scoring, target selection and boredom
//! - [`snapshot`] -- dynamic state captured for persistence

pub mod attention;
pub mod registry;
pub mod snapshot;

pub use attention::{
    AttentionState, AttentionStep, compute_interest, is_bored_of, record_visit, scan_for_targets,
};
pub use registry::{Listener, Snapshot, Subscription, WorldRegistry};
pub use snapshot::{DynamicAgentState, capture_registry, restore_registry};
