//! The world roster: which cubes exist, what is lying around, and the lore.
//!
//! The canonical roster lives in `cubes.yaml` at the project root. Saved
//! dynamic state is merged over it on startup, so editing the roster
//! changes names and starting positions without wiping what cubes learned.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use cubes_types::{
    AgentId, AgentPublicState, AttentionCandidate, Capability, Personality, SocialTrait,
    TargetKind, Vec3,
};

use crate::lore::{LoreBook, LoreFragment};

/// Errors that can occur when loading the world roster.
#[derive(Debug, thiserror::Error)]
pub enum WorldFileError {
    /// Failed to read the roster file from disk.
    #[error("failed to read world file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse world YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The roster parsed but is inconsistent.
    #[error("invalid world file: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for WorldFileError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Static description of one cube.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CubeSpec {
    /// Unique id (`cube-1`).
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Starting personality.
    #[serde(default)]
    pub personality: Personality,
    /// Whether the cube shares what it knows.
    #[serde(default)]
    pub social_trait: SocialTrait,
    /// Starting position.
    #[serde(default)]
    pub position: Vec3,
    /// Capabilities the cube starts with.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl CubeSpec {
    /// Fresh public state for this cube.
    pub fn to_state(&self) -> AgentPublicState {
        let mut state = AgentPublicState::new(
            self.id.clone(),
            self.name.clone(),
            self.personality,
            self.social_trait,
            self.position,
        );
        state.capabilities = self.capabilities.iter().copied().collect();
        state.learning_progress = self.capabilities.iter().map(|c| (*c, 1.0)).collect();
        state
    }
}

/// Something in the world worth paying attention to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointOfInterest {
    /// Unique id.
    pub id: String,
    /// Kind of thing.
    pub kind: TargetKind,
    /// Name used in prompts.
    #[serde(default)]
    pub label: String,
    /// Where it is.
    pub position: Vec3,
    /// Knowledge domain (books).
    #[serde(default)]
    pub domain: Option<String>,
    /// Difficulty in `[0, 1]` (books).
    #[serde(default)]
    pub difficulty: Option<f64>,
}

impl PointOfInterest {
    fn to_candidate(&self) -> AttentionCandidate {
        AttentionCandidate {
            kind: self.kind,
            id: self.id.clone(),
            label: self.label.clone(),
            position: self.position,
            domain: self.domain.clone(),
            difficulty: self.difficulty,
        }
    }
}

/// The parsed roster file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorldFile {
    /// Cubes to register.
    #[serde(default)]
    pub cubes: Vec<CubeSpec>,
    /// Static points of interest.
    #[serde(default)]
    pub points_of_interest: Vec<PointOfInterest>,
    /// World lore.
    #[serde(default)]
    pub lore: Vec<LoreFragment>,
}

impl WorldFile {
    /// Load and validate a roster from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`WorldFileError`] if the file cannot be read or parsed, or
    /// if cube ids repeat.
    pub fn from_file(path: &Path) -> Result<Self, WorldFileError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate a roster from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`WorldFileError`] if the YAML is invalid or cube ids repeat.
    pub fn parse(yaml: &str) -> Result<Self, WorldFileError> {
        let world: Self = serde_yml::from_str(yaml)?;
        let mut seen = BTreeSet::new();
        for cube in &world.cubes {
            if !seen.insert(&cube.id) {
                return Err(WorldFileError::Invalid(format!(
                    "duplicate cube id {}",
                    cube.id
                )));
            }
        }
        Ok(world)
    }

    /// Initial public state of every cube.
    pub fn initial_states(&self) -> Vec<AgentPublicState> {
        self.cubes.iter().map(CubeSpec::to_state).collect()
    }

    /// The lore as a searchable book.
    pub fn lore_book(&self) -> LoreBook {
        LoreBook::new(self.lore.clone())
    }

    /// Attention candidates for cube `id`: every point of interest plus
    /// every other cube in `snapshot`.
    pub fn candidates_for(
        &self,
        id: &AgentId,
        snapshot: &[AgentPublicState],
    ) -> Vec<AttentionCandidate> {
        let cubes = snapshot
            .iter()
            .filter(|other| &other.id != id)
            .map(|other| AttentionCandidate {
                kind: TargetKind::Cube,
                id: other.id.to_string(),
                label: other.name.clone(),
                position: other.position,
                domain: None,
                difficulty: None,
            });
        self.points_of_interest
            .iter()
            .map(PointOfInterest::to_candidate)
            .chain(cubes)
            .collect()
    }
}
