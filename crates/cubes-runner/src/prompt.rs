//! Prompt template loading and rendering via `minijinja`.
//!
//! The default templates under `templates/` are compiled into the binary.
//! When `TEMPLATES_DIR` is set, any file found there with the same name
//! (`decision_system.j2`, ...) replaces the built-in one, so operators can
//! tune cube behavior without recompiling.

use std::io::ErrorKind;
use std::path::Path;

use minijinja::Environment;
use serde::Serialize;

use cubes_types::{AgentMemory, Episode};

use crate::error::RunnerError;

const DECISION_SYSTEM: &str = "decision_system";
const DECISION_USER: &str = "decision_user";
const SYNTHESIS_SYSTEM: &str = "synthesis_system";
const SYNTHESIS_USER: &str = "synthesis_user";

const BUILTIN: [(&str, &str); 4] = [
    (
        DECISION_SYSTEM,
        include_str!("../../../templates/decision_system.j2"),
    ),
    (
        DECISION_USER,
        include_str!("../../../templates/decision_user.j2"),
    ),
    (
        SYNTHESIS_SYSTEM,
        include_str!("../../../templates/synthesis_system.j2"),
    ),
    (
        SYNTHESIS_USER,
        include_str!("../../../templates/synthesis_user.j2"),
    ),
];

/// The complete rendered prompt ready to send to an inference backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message with the response contract.
    pub system: String,
    /// User message with context.
    pub user: String,
}

/// Everything the decision templates can see.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionPrompt<'a> {
    /// Cube display name.
    pub name: &'a str,
    /// Personality label.
    pub personality: &'a str,
    /// Whether to remind the cube what it is.
    pub identity_hint: bool,
    /// Relevant lore, one fragment per line.
    pub lore: &'a str,
    /// Rendered memory context.
    pub memory: &'a str,
    /// Position, or `unknown`.
    pub position: &'a str,
    /// Caller-supplied context (user message or introspection).
    pub context: &'a str,
    /// Shortest lifetime the planner accepts.
    pub min_ttl_ms: u64,
    /// Longest lifetime the planner accepts.
    pub max_ttl_ms: u64,
}

/// One episode line in the synthesis prompt.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeLine<'a> {
    /// Timestamp, `YYYY-MM-DD HH:MM`.
    pub at: String,
    /// Episode summary.
    pub summary: &'a str,
    /// What the user said, if anything.
    pub user_message: Option<&'a str>,
}

/// One skill line in the synthesis prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SkillLine {
    /// Wire name.
    pub name: &'static str,
    /// Level with two decimals.
    pub level: String,
}

/// Everything the synthesis templates can see.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisPrompt<'a> {
    /// Cube display name.
    pub name: &'a str,
    /// Personality label.
    pub personality: &'a str,
    /// Episodes under consideration, oldest first.
    pub episodes: Vec<EpisodeLine<'a>>,
    /// Beliefs already held.
    pub core_beliefs: &'a [String],
    /// Goals already held.
    pub meta_goals: &'a [String],
    /// Current philosophy.
    pub philosophy: Option<&'a str>,
    /// Current skill levels.
    pub skills: Vec<SkillLine>,
}

impl<'a> SynthesisPrompt<'a> {
    /// Build from a memory and the episodes selected for consolidation.
    pub fn from_memory(memory: &'a AgentMemory, episodes: &'a [Episode]) -> Self {
        Self {
            name: &memory.name,
            personality: memory.personality.as_str(),
            episodes: episodes
                .iter()
                .map(|e| EpisodeLine {
                    at: e.at.format("%Y-%m-%d %H:%M").to_string(),
                    summary: &e.summary,
                    user_message: e.user_message.as_deref(),
                })
                .collect(),
            core_beliefs: &memory.core_beliefs,
            meta_goals: &memory.meta_goals,
            philosophy: memory.philosophy.as_deref(),
            skills: memory
                .skills
                .entries()
                .into_iter()
                .map(|(name, level)| SkillLine {
                    name,
                    level: format!("{level:.2}"),
                })
                .collect(),
        }
    }
}

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Built-in templates, with per-file overrides from `templates_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] if an override cannot be read or
    /// any template fails to compile.
    pub fn new(templates_dir: Option<&Path>) -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        for (name, builtin) in BUILTIN {
            let source = match templates_dir {
                Some(dir) => load_override(dir, name)?.unwrap_or_else(|| builtin.to_owned()),
                None => builtin.to_owned(),
            };
            env.add_template_owned(name, source)
                .map_err(|e| RunnerError::Template(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Built-in templates only.
    pub fn builtin() -> Result<Self, RunnerError> {
        Self::new(None)
    }

    /// Render the decision prompt.
    pub fn render_decision(&self, ctx: &DecisionPrompt<'_>) -> Result<RenderedPrompt, RunnerError> {
        Ok(RenderedPrompt {
            system: self.render(DECISION_SYSTEM, ctx)?,
            user: self.render(DECISION_USER, ctx)?,
        })
    }

    /// Render the synthesis prompt.
    pub fn render_synthesis(
        &self,
        ctx: &SynthesisPrompt<'_>,
    ) -> Result<RenderedPrompt, RunnerError> {
        Ok(RenderedPrompt {
            system: self.render(SYNTHESIS_SYSTEM, ctx)?,
            user: self.render(SYNTHESIS_USER, ctx)?,
        })
    }

    fn render(&self, name: &str, ctx: &impl Serialize) -> Result<String, RunnerError> {
        let rendered = self
            .env
            .get_template(name)
            .map_err(|e| RunnerError::Template(format!("missing {name} template: {e}")))?
            .render(ctx)
            .map_err(|e| RunnerError::Template(format!("{name} render failed: {e}")))?;
        Ok(rendered.trim().to_owned())
    }
}

/// Read `<dir>/<name>.j2` if it exists.
fn load_override(dir: &Path, name: &str) -> Result<Option<String>, RunnerError> {
    let path = dir.join(format!("{name}.j2"));
    match std::fs::read_to_string(&path) {
        Ok(source) => {
            tracing::info!(path = %path.display(), "prompt template override loaded");
            Ok(Some(source))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RunnerError::Template(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}
