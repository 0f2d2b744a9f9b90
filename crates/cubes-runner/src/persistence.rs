//! Saving and restoring everything that should outlive a session.
//!
//! Three blobs are kept under fixed keys: every cube's memory, the
//! identity hint counters, and the dynamic part of the registry. Saved
//! registry state is merged over the roster that was registered at
//! startup, so the roster file stays the source of truth for which cubes
//! exist.

use std::collections::BTreeMap;

use tracing::{info, warn};

use cubes_agents::{IdentityHints, MemoryStore};
use cubes_db::{
    DbError, IDENTITY_HINTS_KEY, KeyValueStore, MEMORY_KEY, REGISTRY_STATE_KEY, load_json,
    save_json,
};
use cubes_types::{AgentId, AgentMemory};
use cubes_world::{DynamicAgentState, WorldRegistry, capture_registry, restore_registry};

use crate::error::RunnerError;

/// What [`load_state`] restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Memories restored.
    pub memories: usize,
    /// Cubes with identity hint counters.
    pub hints: usize,
    /// Registered cubes whose dynamic state was restored.
    pub cubes: usize,
}

/// Save memory, identity hints and dynamic registry state.
///
/// # Errors
///
/// Returns [`RunnerError::Db`] if any blob cannot be written. Blobs
/// written before the failure stay written.
pub async fn save_state(
    store: &impl KeyValueStore,
    registry: &WorldRegistry,
    memory: &MemoryStore,
    hints: &IdentityHints,
) -> Result<(), RunnerError> {
    let memories = memory.export();
    save_json(store, MEMORY_KEY, &memories).await?;
    save_json(store, IDENTITY_HINTS_KEY, &hints.export()).await?;
    let cubes = capture_registry(registry);
    save_json(store, REGISTRY_STATE_KEY, &cubes).await?;
    info!(memories = memories.len(), cubes = cubes.len(), "state saved");
    Ok(())
}

/// Restore saved state over the registered roster.
///
/// A blob that no longer matches its schema is skipped with a warning so
/// one bad key cannot block the others.
///
/// # Errors
///
/// Returns [`RunnerError::Db`] if the backend itself fails.
pub async fn load_state(
    store: &impl KeyValueStore,
    registry: &WorldRegistry,
    memory: &MemoryStore,
    hints: &IdentityHints,
) -> Result<LoadReport, RunnerError> {
    let mut report = LoadReport::default();

    if let Some(saved) =
        tolerate_schema(MEMORY_KEY, load_json::<BTreeMap<AgentId, AgentMemory>>(store, MEMORY_KEY).await)?
    {
        report.memories = memory.restore(saved);
    }
    if let Some(saved) = tolerate_schema(
        IDENTITY_HINTS_KEY,
        load_json::<BTreeMap<AgentId, u32>>(store, IDENTITY_HINTS_KEY).await,
    )? {
        report.hints = saved.len();
        hints.restore(saved);
    }
    if let Some(saved) = tolerate_schema(
        REGISTRY_STATE_KEY,
        load_json::<BTreeMap<AgentId, DynamicAgentState>>(store, REGISTRY_STATE_KEY).await,
    )? {
        report.cubes = restore_registry(registry, &saved);
    }

    info!(
        memories = report.memories,
        hints = report.hints,
        cubes = report.cubes,
        "state restored"
    );
    Ok(report)
}

fn tolerate_schema<T>(key: &str, loaded: Result<Option<T>, DbError>) -> Result<Option<T>, RunnerError> {
    match loaded {
        Ok(value) => Ok(value),
        Err(DbError::Serialization(e)) => {
            warn!(key, error = %e, "saved blob no longer matches, ignoring it");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
