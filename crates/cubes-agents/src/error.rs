//! Error types for the cubes-agents crate.
//!
//! Only precondition violations surface as errors. Best-effort side
//! effects (expression, social learning) log and carry on instead.

use cubes_types::AgentId;

/// Errors that can occur during memory and agent state operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Memory was mutated before [`initialize`](crate::memory::MemoryStore::initialize).
    #[error("memory not initialized for agent {0}")]
    MemoryNotInitialized(AgentId),

    /// Agent with the given ID is not registered in the world.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The store's lock was poisoned by a panicking writer.
    #[error("memory store unavailable")]
    StoreUnavailable,

    /// A persisted memory blob could not be (de)serialized.
    #[error("memory serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
