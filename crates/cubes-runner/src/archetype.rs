//! Personality archetypes and the inference model serving each of them.
//!
//! Every personality maps to one archetype, and every archetype to one
//! model identifier. The defaults target a local model runtime behind the
//! inference proxy; `LLM_MODEL_<ARCHETYPE>` overrides any of them.

use std::collections::BTreeMap;

use cubes_types::Personality;

/// Inference persona selected by personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Archetype {
    /// Calm cubes.
    Sage,
    /// Extrovert cubes.
    Socialite,
    /// Curious cubes.
    Explorer,
    /// Chaotic cubes.
    Trickster,
    /// Neutral cubes.
    Everycube,
}

impl Archetype {
    /// All archetypes in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Sage,
        Self::Socialite,
        Self::Explorer,
        Self::Trickster,
        Self::Everycube,
    ];

    /// The archetype serving `personality`.
    pub const fn for_personality(personality: Personality) -> Self {
        match personality {
            Personality::Calm => Self::Sage,
            Personality::Extrovert => Self::Socialite,
            Personality::Curious => Self::Explorer,
            Personality::Chaotic => Self::Trickster,
            Personality::Neutral => Self::Everycube,
        }
    }

    /// Lowercase label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sage => "sage",
            Self::Socialite => "socialite",
            Self::Explorer => "explorer",
            Self::Trickster => "trickster",
            Self::Everycube => "everycube",
        }
    }

    /// Suffix of the environment variable overriding this archetype's model.
    pub const fn env_suffix(self) -> &'static str {
        match self {
            Self::Sage => "SAGE",
            Self::Socialite => "SOCIALITE",
            Self::Explorer => "EXPLORER",
            Self::Trickster => "TRICKSTER",
            Self::Everycube => "EVERYCUBE",
        }
    }

    /// Model used when no override is configured.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Sage => "llama3.1:8b",
            Self::Socialite => "mistral:7b",
            Self::Explorer => "qwen2.5:7b",
            Self::Trickster => "gemma2:9b",
            Self::Everycube => "llama3.2:3b",
        }
    }
}

/// Resolved model identifier per archetype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTable {
    overrides: BTreeMap<Archetype, String>,
}

impl ModelTable {
    /// Defaults with the given overrides applied. Blank overrides are ignored.
    pub fn with_overrides(overrides: &BTreeMap<Archetype, String>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .filter(|(_, model)| !model.trim().is_empty())
                .map(|(archetype, model)| (*archetype, model.trim().to_owned()))
                .collect(),
        }
    }

    /// Model serving `archetype`.
    pub fn model(&self, archetype: Archetype) -> &str {
        self.overrides
            .get(&archetype)
            .map_or_else(|| archetype.default_model(), String::as_str)
    }

    /// Model serving a cube with `personality`.
    pub fn model_for(&self, personality: Personality) -> &str {
        self.model(Archetype::for_personality(personality))
    }
}
