//! Action bridge: maps decision or reply text to expressive effects.
//!
//! [`derive_actions`] is pure keyword classification. [`apply_actions`]
//! writes the result to the registry as a 4-second modifier plus, when
//! any cue is present, a transient action with the same expiry. The
//! transient action replaces any previous one; modifiers accumulate until
//! they expire.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use cubes_types::{ActiveModifier, AgentId, AgentMemory, AgentStatePatch, Emotion, TransientAction};
use cubes_world::WorldRegistry;

use crate::classifier::{detect_emotion, mentions_any};
use crate::error::AgentError;

/// Lifetime of a modifier and its transient action, in milliseconds.
pub const ACTION_TTL_MS: i64 = 4_000;

/// Preference count above which a cube with no detected emotion is
/// assumed curious.
const CURIOUS_FALLBACK_PREFERENCES: usize = 3;

/// Specific modifiers that take precedence over the emotion modifier.
const SPECIFIC_MODIFIERS: &[(&str, &[&str])] = &[
    ("sarcastic", &["sarcastic", "sarcasm", "yeah right", "oh great", "sure thing"]),
    ("serene", &["serene", "peaceful", "tranquil", "calm", "still"]),
    ("observing", &["observe", "observing", "watch", "watching", "look around", "study"]),
];

/// Words that make a cube hop.
const JUMP_CUES: &[&str] = &["jump", "hop", "bounce", "yay", "woohoo", "leap"];

/// Words that flash the emphasis light.
const EMPHASIS_CUES: &[&str] = &["important", "listen", "look", "wow", "attention", "alert"];

/// Body color for an emotion.
pub const fn emotion_color(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Happy => "#FFD700",
        Emotion::Sad => "#4169E1",
        Emotion::Curious => "#32CD32",
        Emotion::Reflective => "#9370DB",
        Emotion::Frustrated => "#FF4500",
    }
}

/// Expressive effects derived from one piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    /// Detected (or fallback) emotion.
    pub emotion: Option<Emotion>,
    /// Modifier to attach: a specific modifier, else the emotion name.
    pub modifier: Option<String>,
    /// Body color for the transient action.
    pub color_shift: Option<String>,
    /// Hop in place.
    pub jump: bool,
    /// Flash the emphasis light.
    pub emphasis_light: bool,
}

impl ActionSet {
    /// Whether the set carries a transient cue.
    pub const fn has_transient(&self) -> bool {
        self.color_shift.is_some() || self.jump || self.emphasis_light
    }

    /// Whether there is nothing to apply.
    pub const fn is_empty(&self) -> bool {
        self.modifier.is_none() && !self.has_transient()
    }
}

/// Classify `text` into expressive effects.
///
/// The first matching emotion family wins. With no match, a memory holding
/// more than three preferences falls back to `curious`.
pub fn derive_actions(text: &str, memory: Option<&AgentMemory>) -> ActionSet {
    let emotion = detect_emotion(text).or_else(|| {
        memory
            .filter(|m| m.preferences.len() > CURIOUS_FALLBACK_PREFERENCES)
            .map(|_| Emotion::Curious)
    });

    let specific = SPECIFIC_MODIFIERS
        .iter()
        .find(|(_, keywords)| mentions_any(text, keywords))
        .map(|(name, _)| (*name).to_owned());

    let exclaims = text.matches('!').count() >= 2;

    ActionSet {
        emotion,
        modifier: specific.or_else(|| emotion.map(|e| e.as_str().to_owned())),
        color_shift: emotion.map(|e| emotion_color(e).to_owned()),
        jump: mentions_any(text, JUMP_CUES),
        emphasis_light: exclaims || mentions_any(text, EMPHASIS_CUES),
    }
}

/// Write `actions` to the registry for `id`.
///
/// Returns whether the registry observed a change. Fails only if the cube
/// is not registered.
pub fn apply_actions(
    registry: &WorldRegistry,
    id: &AgentId,
    actions: &ActionSet,
) -> Result<bool, AgentError> {
    apply_actions_at(registry, id, actions, Utc::now())
}

/// [`apply_actions`] evaluated at an explicit instant.
pub fn apply_actions_at(
    registry: &WorldRegistry,
    id: &AgentId,
    actions: &ActionSet,
    now: DateTime<Utc>,
) -> Result<bool, AgentError> {
    if actions.is_empty() {
        return if registry.contains(id) {
            Ok(false)
        } else {
            Err(AgentError::AgentNotFound(id.clone()))
        };
    }
    let Some(expires_at) = now.checked_add_signed(TimeDelta::milliseconds(ACTION_TTL_MS)) else {
        return Ok(false);
    };

    let transient = actions.has_transient().then(|| TransientAction {
        color_shift: actions.color_shift.clone(),
        jump: actions.jump,
        emphasis_light: actions.emphasis_light,
        expires_at,
    });
    // The modifier is appended under the registry lock so a concurrent
    // reply and tick for the same cube both keep theirs.
    let changed = registry
        .modify_at(id, now, |current| {
            let modifiers = actions.modifier.as_ref().map(|name| {
                let mut modifiers = current.modifiers.clone();
                modifiers.push(ActiveModifier {
                    name: name.clone(),
                    expires_at,
                });
                modifiers
            });
            AgentStatePatch {
                modifiers,
                transient,
                ..AgentStatePatch::default()
            }
        })
        .ok_or_else(|| AgentError::AgentNotFound(id.clone()))?;
    debug!(
        agent_id = %id,
        modifier = actions.modifier.as_deref().unwrap_or("-"),
        changed,
        "actions applied"
    );
    Ok(changed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use cubes_types::{AgentPublicState, Personality, SocialTrait, Vec3};

    use super::*;

    fn registry_with_cube() -> (WorldRegistry, AgentId) {
        let registry = WorldRegistry::new();
        let id = AgentId::from("cube-1");
        registry.register(AgentPublicState::new(
            id.clone(),
            "Pip",
            Personality::Curious,
            SocialTrait::Kind,
            Vec3::ZERO,
        ));
        (registry, id)
    }

    #[test]
    fn emotion_color_and_modifier() {
        let actions = derive_actions("I'm so happy to see you", None);
        assert_eq!(actions.emotion, Some(Emotion::Happy));
        assert_eq!(actions.color_shift.as_deref(), Some("#FFD700"));
        assert_eq!(actions.modifier.as_deref(), Some("happy"));
    }

    #[test]
    fn specific_modifier_wins_over_emotion() {
        let actions = derive_actions("Oh great, another sad rainy day", None);
        assert_eq!(actions.emotion, Some(Emotion::Sad));
        assert_eq!(actions.modifier.as_deref(), Some("sarcastic"));
        assert_eq!(actions.color_shift.as_deref(), Some("#4169E1"));
    }

    #[test]
    fn curious_fallback_needs_preferences() {
        let text = "the stone is grey";
        assert_eq!(derive_actions(text, None), ActionSet::default());

        let mut memory = cubes_types::AgentMemory {
            agent_id: AgentId::from("cube-1"),
            name: "Pip".to_owned(),
            personality: Personality::Neutral,
            traits: vec![],
            facts: vec![],
            preferences: vec!["a".into(), "b".into(), "c".into()],
            emotional_state: cubes_types::EmotionalState::default(),
            stats: cubes_types::ConversationStats::default(),
            episodes: vec![],
            core_beliefs: vec![],
            meta_goals: vec![],
            skills: cubes_types::SkillVector::default(),
            synthesis_history: vec![],
            philosophy: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(derive_actions(text, Some(&memory)).emotion, None);
        memory.preferences.push("d".into());
        assert_eq!(
            derive_actions(text, Some(&memory)).emotion,
            Some(Emotion::Curious)
        );
    }

    #[test]
    fn cues() {
        let actions = derive_actions("Look! A bouncy ball! Let's jump", None);
        assert!(actions.jump);
        assert!(actions.emphasis_light);
    }

    #[test]
    fn transient_is_last_write_wins_and_modifiers_accumulate() {
        let (registry, id) = registry_with_cube();
        let now = Utc::now();

        let happy = derive_actions("happy happy", None);
        let sad = derive_actions("so sad and lonely", None);
        assert!(apply_actions_at(&registry, &id, &happy, now).unwrap());
        assert!(apply_actions_at(&registry, &id, &sad, now).unwrap());

        let state = registry.get_at(&id, now).unwrap();
        let names: Vec<&str> = state.modifiers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["happy", "sad"]);
        assert_eq!(
            state.transient.and_then(|t| t.color_shift).as_deref(),
            Some("#4169E1")
        );

        let later = now + chrono::Duration::milliseconds(ACTION_TTL_MS);
        let state = registry.get_at(&id, later).unwrap();
        assert!(state.modifiers.is_empty());
        assert!(state.transient.is_none());
    }

    #[test]
    fn unknown_cube_is_an_error() {
        let registry = WorldRegistry::new();
        let result = apply_actions(&registry, &AgentId::from("ghost"), &ActionSet::default());
        assert!(matches!(result, Err(AgentError::AgentNotFound(_))));
    }

    #[test]
    fn concurrent_writers_keep_every_modifier() {
        let (registry, id) = registry_with_cube();
        let now = Utc::now();
        let happy = derive_actions("happy", None);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        apply_actions_at(&registry, &id, &happy, now).unwrap();
                    }
                });
            }
        });

        let state = registry.get_at(&id, now).unwrap();
        assert_eq!(state.modifiers.len(), 80);
    }
}
