//! Cube cognition state that lives outside the registry.
//!
//! This crate holds the synchronous logic layer for cubes: durable memory,
//! text classification, expressive effects and social learning. It never
//! performs I/O; inference and persistence live in `cubes-runner` and
//! `cubes-db`.
//!
//! # Modules
//!
//! - [`actions`] -- Action bridge from text to modifiers and transient actions
//! - [`classifier`] -- Keyword intent/emotion classifier behind [`IntentClassifier`]
//! - [`error`] -- Error types ([`AgentError`])
//! - [`identity`] -- Identity hint counters
//! - [`memory`] -- Memory store, deltas and synthesis application
//! - [`social`] -- Capability diffusion between neighbors

pub mod actions;
pub mod classifier;
pub mod error;
pub mod identity;
pub mod memory;
pub mod social;

pub use actions::{ActionSet, apply_actions, derive_actions};
pub use classifier::{Classification, IntentClassifier, KeywordClassifier};
pub use error::AgentError;
pub use identity::IdentityHints;
pub use memory::{MemoryConfig, MemoryDelta, MemoryStore, SynthesisUpdate};
pub use social::{LearnOutcome, SocialEvent, social_learning_step};
