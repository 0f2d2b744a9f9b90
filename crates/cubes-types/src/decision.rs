//! Behavior decision wire types.
//!
//! These structs mirror the JSON object the inference service is asked to
//! return. Only `goal` and `intent` are required; every other field is
//! optional and defaults to absent.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{PersonalityShift, TargetKind};
use crate::state::Vec3;

/// Where a decision wants the cube to go or look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct DecisionTarget {
    /// Kind of target.
    #[serde(rename = "type")]
    pub kind: TargetKind,
    /// Identifier of the book, cube or zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Explicit world position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
}

/// One-shot expressive effects requested by a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TransientEffects {
    /// Hop in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump: Option<bool>,
    /// Temporary body color (CSS color string).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_shift: Option<String>,
    /// Flash the emphasis light.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_pulse: Option<bool>,
}

impl TransientEffects {
    /// Whether at least one effect is actually requested.
    pub fn is_empty(&self) -> bool {
        !self.jump.unwrap_or(false)
            && !self.light_pulse.unwrap_or(false)
            && self.color_shift.as_deref().is_none_or(str::is_empty)
    }
}

/// Durable learning a decision wants recorded in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct LearningUpdate {
    /// New personality traits.
    #[serde(default)]
    pub add_traits: Vec<String>,
    /// New facts about the world or the user.
    #[serde(default)]
    pub add_facts: Vec<String>,
    /// New likes and dislikes.
    #[serde(default)]
    pub add_preferences: Vec<String>,
}

impl LearningUpdate {
    /// Whether the update carries nothing to learn.
    pub fn is_empty(&self) -> bool {
        self.add_traits.is_empty() && self.add_facts.is_empty() && self.add_preferences.is_empty()
    }
}

/// A structured decision produced by the behavior planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BehaviorDecision {
    /// What the cube is trying to achieve.
    pub goal: String,
    /// What the cube is about to do.
    pub intent: String,
    /// Optional target of the behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<DecisionTarget>,
    /// Optional one-shot effects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transient: Option<TransientEffects>,
    /// Optional durable learning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning: Option<LearningUpdate>,
    /// Free-form mood word.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Personality drift hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_shift: Option<PersonalityShift>,
    /// Requested lifetime in milliseconds (clamped by the planner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

impl BehaviorDecision {
    /// Text used by the action bridge to derive expressive cues.
    pub fn expressive_text(&self) -> String {
        let mut text = format!("{} {}", self.goal, self.intent);
        if let Some(mood) = &self.mood {
            text.push(' ');
            text.push_str(mood);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_uses_camel_case_wire_names() {
        let raw = r##"{
            "goal": "read",
            "intent": "walk to the red book",
            "target": {"type": "book", "id": "book-2", "position": [1.0, 0.0, 2.5]},
            "transient": {"colorShift": "#ff0000", "lightPulse": true},
            "learning": {"addFacts": ["books are heavy"]},
            "personalityShift": "more_curious",
            "ttlMs": 8000
        }"##;
        let decision: Result<BehaviorDecision, _> = serde_json::from_str(raw);
        assert!(decision.is_ok());
        let Ok(decision) = decision else { return };
        assert_eq!(decision.ttl_ms, Some(8000));
        assert_eq!(
            decision.target.as_ref().map(|t| t.kind),
            Some(TargetKind::Book)
        );
        assert_eq!(
            decision.personality_shift,
            Some(PersonalityShift::MoreCurious)
        );
        assert_eq!(
            decision.learning.map(|l| l.add_facts.len()),
            Some(1)
        );
    }

    #[test]
    fn empty_transient_effects() {
        assert!(TransientEffects::default().is_empty());
        let effects = TransientEffects {
            jump: Some(false),
            color_shift: Some(String::new()),
            light_pulse: None,
        };
        assert!(effects.is_empty());
        let effects = TransientEffects {
            jump: Some(true),
            ..TransientEffects::default()
        };
        assert!(!effects.is_empty());
    }
}
