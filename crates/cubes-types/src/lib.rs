//! Shared type definitions for the cube world simulation.
//!
//! This crate is the single source of truth for the data shapes exchanged
//! between the registry, the memory store, the planner and the renderer.
//! Types flow downstream to `TypeScript` via `ts-rs` for the UI.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier wrappers ([`AgentId`], [`EpisodeId`])
//! - [`enums`] -- Personality, capabilities, targets, emotions, intents
//! - [`state`] -- Public per-cube state and partial updates
//! - [`decision`] -- Behavior decision wire schema
//! - [`memory`] -- Durable per-cube memory records
//! - [`attention`] -- Attention candidates and targets

pub mod attention;
pub mod decision;
pub mod enums;
pub mod ids;
pub mod memory;
pub mod state;

pub use attention::{AttentionCandidate, AttentionTarget};
pub use decision::{BehaviorDecision, DecisionTarget, LearningUpdate, TransientEffects};
pub use enums::{
    Capability, Emotion, IntentTag, Personality, PersonalityShift, SocialTrait, TargetKind, Tone,
};
pub use ids::{AgentId, EpisodeId};
pub use memory::{
    AgentMemory, ConversationStats, EmotionalState, Episode, SkillVector, SynthesisRecord,
};
pub use state::{
    ActiveModifier, AgentPublicState, AgentStatePatch, BehaviorState, ReadingExperience,
    TransientAction, Vec3,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the renderer.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::AgentId::export_all();
        let _ = crate::state::AgentPublicState::export_all();
        let _ = crate::decision::BehaviorDecision::export_all();
        let _ = crate::memory::AgentMemory::export_all();
        let _ = crate::attention::AttentionTarget::export_all();
    }
}
