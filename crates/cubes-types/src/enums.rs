//! Enumeration types shared across the cube world crates.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Personality & social disposition
// ---------------------------------------------------------------------------

/// Coarse personality archetype of a cube.
///
/// Personality drives attention weights, thinking cadence, teaching
/// willingness and which inference model variant serves the cube.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    /// Slow, patient, observant.
    Calm,
    /// Social and talkative.
    Extrovert,
    /// Restless, drawn to anything new.
    Curious,
    /// Impulsive and unpredictable.
    Chaotic,
    /// No strong leaning.
    #[default]
    Neutral,
}

impl Personality {
    /// All personalities in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Calm,
        Self::Extrovert,
        Self::Curious,
        Self::Chaotic,
        Self::Neutral,
    ];

    /// Lowercase label used in prompts and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Extrovert => "extrovert",
            Self::Curious => "curious",
            Self::Chaotic => "chaotic",
            Self::Neutral => "neutral",
        }
    }
}

impl core::fmt::Display for Personality {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a cube shares what it knows.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SocialTrait {
    /// Readily teaches neighbors.
    #[default]
    Kind,
    /// Rarely teaches.
    Selfish,
}

impl SocialTrait {
    /// Lowercase label used in prompts and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kind => "kind",
            Self::Selfish => "selfish",
        }
    }
}

/// A learnable capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Can flip itself upright after tipping over.
    SelfRighting,
    /// Can deliberately travel toward a target.
    Navigation,
}

impl Capability {
    /// All capabilities in declaration order.
    pub const ALL: [Self; 2] = [Self::SelfRighting, Self::Navigation];

    /// Lowercase label used in prompts and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfRighting => "self_righting",
            Self::Navigation => "navigation",
        }
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Kind of thing a cube can pay attention to or move toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A readable book lying in the world.
    Book,
    /// Another cube.
    Cube,
    /// A named region of the world.
    Zone,
    /// Background scenery (light, sound, weather).
    Ambient,
    /// No target.
    None,
}

impl TargetKind {
    /// Lowercase label used in prompts and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Cube => "cube",
            Self::Zone => "zone",
            Self::Ambient => "ambient",
            Self::None => "none",
        }
    }
}

/// Personality drift hint carried by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum PersonalityShift {
    /// Drift toward calm.
    MoreCalm,
    /// Drift toward curious.
    MoreCurious,
    /// Drift toward extrovert.
    MoreExtrovert,
    /// Drift toward chaotic.
    MoreChaotic,
    /// Drift toward neutral.
    MoreNeutral,
    /// No drift.
    None,
}

impl PersonalityShift {
    /// The personality this shift leans toward, if any.
    pub const fn toward(self) -> Option<Personality> {
        match self {
            Self::MoreCalm => Some(Personality::Calm),
            Self::MoreCurious => Some(Personality::Curious),
            Self::MoreExtrovert => Some(Personality::Extrovert),
            Self::MoreChaotic => Some(Personality::Chaotic),
            Self::MoreNeutral => Some(Personality::Neutral),
            Self::None => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Expression & conversation
// ---------------------------------------------------------------------------

/// Emotion families recognised by the keyword classifier.
///
/// Declaration order is the classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    /// Joy, delight.
    Happy,
    /// Sadness, loneliness.
    Sad,
    /// Wonder, interest.
    Curious,
    /// Thoughtfulness.
    Reflective,
    /// Annoyance, anger.
    Frustrated,
}

impl Emotion {
    /// All emotions in classification priority order.
    pub const PRIORITY: [Self; 5] = [
        Self::Happy,
        Self::Sad,
        Self::Curious,
        Self::Reflective,
        Self::Frustrated,
    ];

    /// Lowercase label, also used as the modifier name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Curious => "curious",
            Self::Reflective => "reflective",
            Self::Frustrated => "frustrated",
        }
    }
}

/// Coarse intent of an incoming user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    /// Compliment or encouragement.
    Praise,
    /// Complaint or insult.
    Criticism,
    /// A question.
    Question,
    /// Hello / goodbye.
    Greeting,
    /// Anything else.
    Statement,
}

/// Tone of the most recent interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Friendly.
    Positive,
    /// Hostile or dismissive.
    Negative,
    /// Asking something.
    Inquisitive,
    /// Flat.
    Neutral,
}

impl From<IntentTag> for Tone {
    fn from(intent: IntentTag) -> Self {
        match intent {
            IntentTag::Praise | IntentTag::Greeting => Self::Positive,
            IntentTag::Criticism => Self::Negative,
            IntentTag::Question => Self::Inquisitive,
            IntentTag::Statement => Self::Neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personality_serializes_lowercase() {
        let json = serde_json::to_string(&Personality::Chaotic).unwrap_or_default();
        assert_eq!(json, "\"chaotic\"");
    }

    #[test]
    fn personality_shift_wire_names() {
        let shift: Result<PersonalityShift, _> = serde_json::from_str("\"more_calm\"");
        assert!(matches!(shift, Ok(PersonalityShift::MoreCalm)));
        assert_eq!(PersonalityShift::None.toward(), None);
    }

    #[test]
    fn capability_wire_names() {
        let json = serde_json::to_string(&Capability::SelfRighting).unwrap_or_default();
        assert_eq!(json, "\"self_righting\"");
    }

    #[test]
    fn intent_maps_to_tone() {
        assert_eq!(Tone::from(IntentTag::Praise), Tone::Positive);
        assert_eq!(Tone::from(IntentTag::Criticism), Tone::Negative);
        assert_eq!(Tone::from(IntentTag::Question), Tone::Inquisitive);
    }
}
