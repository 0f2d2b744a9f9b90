//! Error types for the cube runner.
//!
//! Uses `thiserror` for typed errors that surface through the runner
//! pipeline: inference calls, prompt rendering, response parsing, world
//! loading and persistence. Planner and synthesis never hand these to
//! their callers; they log them and degrade to "no decision".

use crate::world::WorldFileError;

/// Errors that can occur during runner operation.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Failed to render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An inference backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The inference response matched none of the known text shapes.
    #[error("inference response carried no usable text")]
    NoUsableText,

    /// The response text could not be parsed into the expected JSON object.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A memory or world-state precondition failed.
    #[error("agent error: {0}")]
    Agent(#[from] cubes_agents::AgentError),

    /// The persistence backend failed.
    #[error("state store error: {0}")]
    Db(#[from] cubes_db::DbError),

    /// The world roster file could not be loaded.
    #[error("world file error: {0}")]
    World(#[from] WorldFileError),
}
