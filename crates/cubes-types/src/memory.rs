//! Durable per-cube memory records.
//!
//! [`AgentMemory`] survives across sessions through the persistence
//! collaborator. All list bounds are enforced by the memory store in
//! `cubes-agents`, not by these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Emotion, IntentTag, Personality, Tone};
use crate::ids::{AgentId, EpisodeId};

/// Emotional state remembered from recent interactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct EmotionalState {
    /// Emotion that dominated the last exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<Emotion>,
    /// Tone of the last user interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_tone: Option<Tone>,
}

/// Running conversation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    /// Total memory updates (one per interaction).
    pub messages: u32,
    /// Interactions classified as praise.
    pub praises: u32,
    /// Interactions classified as criticism.
    pub criticisms: u32,
    /// Interactions classified as questions.
    pub questions: u32,
    /// Interactions since the last applied synthesis.
    pub interactions_since_synthesis: u32,
}

/// Six bounded skill scalars in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SkillVector {
    /// Ease with others.
    pub social: f64,
    /// Sensitivity to feelings.
    pub empathy: f64,
    /// Willingness to push back.
    pub assertiveness: f64,
    /// Drive to explore.
    pub curiosity: f64,
    /// Novelty of expression.
    pub creativity: f64,
    /// Structured reasoning.
    pub logic: f64,
}

impl SkillVector {
    /// Every skill at the same level.
    pub const fn uniform(level: f64) -> Self {
        Self {
            social: level,
            empathy: level,
            assertiveness: level,
            curiosity: level,
            creativity: level,
            logic: level,
        }
    }

    /// Mutable access to a skill by wire name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "social" => Some(&mut self.social),
            "empathy" => Some(&mut self.empathy),
            "assertiveness" => Some(&mut self.assertiveness),
            "curiosity" => Some(&mut self.curiosity),
            "creativity" => Some(&mut self.creativity),
            "logic" => Some(&mut self.logic),
            _ => None,
        }
    }

    /// `(name, level)` pairs in wire order.
    pub const fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("social", self.social),
            ("empathy", self.empathy),
            ("assertiveness", self.assertiveness),
            ("curiosity", self.curiosity),
            ("creativity", self.creativity),
            ("logic", self.logic),
        ]
    }
}

impl Default for SkillVector {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

/// One remembered exchange or autonomous thought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Identifier.
    pub id: EpisodeId,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Intent of the triggering message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentTag>,
    /// The user's message, absent for autonomous thoughts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    /// One-line summary of what happened.
    pub summary: String,
}

/// Record of one applied synthesis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRecord {
    /// When the synthesis was applied.
    pub at: DateTime<Utc>,
    /// The summary returned by the inference service.
    pub summary: String,
    /// Number of episodes the synthesis looked at.
    pub episodes_considered: u32,
}

/// Durable memory of one cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct AgentMemory {
    /// Owner.
    pub agent_id: AgentId,
    /// Display name at initialization.
    pub name: String,
    /// Personality at initialization.
    pub personality: Personality,
    /// Personality traits, ordered, unique.
    #[serde(default)]
    pub traits: Vec<String>,
    /// Facts, ordered, unique, bounded.
    #[serde(default)]
    pub facts: Vec<String>,
    /// Likes and dislikes, ordered, unique, bounded.
    #[serde(default)]
    pub preferences: Vec<String>,
    /// Remembered emotional state.
    #[serde(default)]
    pub emotional_state: EmotionalState,
    /// Conversation counters.
    #[serde(default)]
    pub stats: ConversationStats,
    /// Episodic log, oldest first.
    #[serde(default)]
    pub episodes: Vec<Episode>,
    /// Beliefs distilled by synthesis.
    #[serde(default)]
    pub core_beliefs: Vec<String>,
    /// Goals distilled by synthesis.
    #[serde(default)]
    pub meta_goals: Vec<String>,
    /// Skills vector.
    #[serde(default)]
    pub skills: SkillVector,
    /// Past synthesis passes, oldest first.
    #[serde(default)]
    pub synthesis_history: Vec<SynthesisRecord>,
    /// Current philosophy statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub philosophy: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}
