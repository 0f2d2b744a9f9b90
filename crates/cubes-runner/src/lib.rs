//! Cube cognition runtime.
//!
//! Turns context into behavior for every cube in the world: it renders
//! prompts, calls an inference backend over HTTP, parses and validates the
//! decision, and applies the result to shared world state and memory. The
//! simulation loop drives all of it, reactively on user input and
//! autonomously on personality-dependent thinking ticks.
//!
//! # Architecture
//!
//! ```text
//! user input ─┐
//!             ├─> Planner ──> Prompt Engine ──> Inference ──> Parser ──> Effects
//! tick timer ─┘      │                                                    │
//!                    └──── WorldRegistry / MemoryStore <──────────────────┘
//! ```
//!
//! A failed inference call never stops the world; the cube simply does
//! nothing new until its next tick.

pub mod archetype;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod lore;
pub mod parse;
pub mod persistence;
pub mod planner;
pub mod prompt;
pub mod scheduler;
pub mod simulation;
pub mod synthesis;
pub mod world;

pub use error::RunnerError;
pub use llm::{Inference, InferenceRequest, LlmBackend, create_backend};
pub use planner::{Effect, Planner};
pub use simulation::{Simulation, UserMessage};
pub use synthesis::SynthesisOutcome;
