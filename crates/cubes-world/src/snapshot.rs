//! Dynamic registry state that survives across sessions.
//!
//! Only the fields that evolve during play are captured; names, social
//! traits and time-limited effects come from the static roster or are
//! recreated at runtime. On load the captured values are merged over the
//! roster, and a captured field overrides the static one only when present.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use cubes_types::{
    AgentId, AgentPublicState, AgentStatePatch, Capability, Personality, ReadingExperience, Vec3,
};

use crate::registry::WorldRegistry;

/// Persisted dynamic fields of one cube.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicAgentState {
    /// Last known position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    /// Current personality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<Personality>,
    /// Acquired capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<BTreeSet<Capability>>,
    /// Progress toward capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_progress: Option<BTreeMap<Capability, f64>>,
    /// Knowledge by domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<BTreeMap<String, f64>>,
    /// Reading summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<ReadingExperience>,
}

impl DynamicAgentState {
    /// Capture the dynamic fields of a live cube.
    pub fn capture(state: &AgentPublicState) -> Self {
        Self {
            position: Some(state.position),
            personality: Some(state.personality),
            capabilities: Some(state.capabilities.clone()),
            learning_progress: Some(state.learning_progress.clone()),
            knowledge: Some(state.knowledge.clone()),
            reading: Some(state.reading.clone()),
        }
    }

    /// The present fields as a registry patch.
    pub fn to_patch(&self) -> AgentStatePatch {
        AgentStatePatch {
            position: self.position,
            personality: self.personality,
            capabilities: self.capabilities.clone(),
            learning_progress: self.learning_progress.clone(),
            knowledge: self.knowledge.clone(),
            reading: self.reading.clone(),
            ..AgentStatePatch::default()
        }
    }
}

/// Capture every registered cube, keyed by id.
pub fn capture_registry(registry: &WorldRegistry) -> BTreeMap<AgentId, DynamicAgentState> {
    registry
        .list_all()
        .iter()
        .map(|state| (state.id.clone(), DynamicAgentState::capture(state)))
        .collect()
}

/// Apply saved dynamic state to registered cubes.
///
/// Entries for cubes that are not registered are ignored. Returns how
/// many cubes were restored.
pub fn restore_registry(
    registry: &WorldRegistry,
    saved: &BTreeMap<AgentId, DynamicAgentState>,
) -> usize {
    let mut restored = 0_usize;
    for (id, dynamic) in saved {
        if !registry.contains(id) {
            debug!(agent_id = %id, "saved state for unknown cube skipped");
            continue;
        }
        registry.update(id, dynamic.to_patch());
        restored = restored.saturating_add(1);
    }
    restored
}
