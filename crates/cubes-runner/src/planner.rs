//! Behavior planner: context in, validated decision out.
//!
//! Pipeline per call to [`Planner::plan_behavior`]:
//! 1. Stamp the request with the next per-cube sequence number
//! 2. Pick the model for the cube's archetype
//! 3. Render the decision prompt (lore, memory, position, context)
//! 4. Call the inference backend
//! 5. Parse the decision (`goal` and `intent` required)
//! 6. Discard the result if a newer request has already been applied
//! 7. Turn the decision into [`Effect`]s and apply them
//!
//! Nothing in here returns an error to the caller. Transport failures,
//! unusable bodies and malformed decisions all log a warning and yield
//! `None`; failures while applying effects are logged and skipped.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use cubes_agents::{IdentityHints, MemoryStore};
use cubes_types::{
    AgentId, AgentStatePatch, BehaviorDecision, BehaviorState, LearningUpdate, Personality,
    PersonalityShift, TransientAction,
};
use cubes_world::WorldRegistry;

use crate::archetype::ModelTable;
use crate::error::RunnerError;
use crate::llm::{Inference, InferenceRequest};
use crate::lore::{DEFAULT_LORE_LIMIT, LoreBook};
use crate::parse::parse_decision;
use crate::prompt::{DecisionPrompt, PromptEngine};

/// Lifetime used when the decision does not ask for one.
pub const DEFAULT_TTL_MS: u64 = 6_000;

/// Shortest accepted decision lifetime.
pub const MIN_TTL_MS: u64 = 1_000;

/// Longest accepted decision lifetime.
pub const MAX_TTL_MS: u64 = 15_000;

/// Requested lifetime, defaulted and clamped to the accepted range.
pub fn clamp_ttl(ttl_ms: Option<u64>) -> u64 {
    ttl_ms.unwrap_or(DEFAULT_TTL_MS).clamp(MIN_TTL_MS, MAX_TTL_MS)
}

/// Absolute expiry of a decision issued at `now`.
pub fn expiry_for(ttl_ms: Option<u64>, now: DateTime<Utc>) -> DateTime<Utc> {
    let millis = i64::try_from(clamp_ttl(ttl_ms)).unwrap_or_default();
    now.checked_add_signed(TimeDelta::milliseconds(millis))
        .unwrap_or(now)
}

/// Memory trait recorded for a personality drift hint.
pub const fn shift_trait(shift: PersonalityShift) -> Option<&'static str> {
    match shift {
        PersonalityShift::MoreCalm => Some("leaning calmer"),
        PersonalityShift::MoreCurious => Some("leaning more curious"),
        PersonalityShift::MoreExtrovert => Some("leaning more outgoing"),
        PersonalityShift::MoreChaotic => Some("leaning more chaotic"),
        PersonalityShift::MoreNeutral => Some("leaning more even-tempered"),
        PersonalityShift::None => None,
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// One side effect of an accepted decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Record learning in the cube's memory.
    ApplyLearning(LearningUpdate),
    /// Record a personality drift hint as a memory trait.
    RecordPersonalityShift(PersonalityShift),
    /// Commit the decision (and its one-shot effects) to the registry.
    WriteBehavior {
        /// The decision with its absolute expiry.
        behavior: Box<BehaviorState>,
        /// One-shot effects, re-timestamped to the decision's expiry.
        transient: Option<TransientAction>,
    },
}

/// The effects of `decision`, issued under `sequence` at `now`.
///
/// Learning comes first so the memory is current by the time renderers
/// see the new behavior.
pub fn plan_effects(decision: &BehaviorDecision, sequence: u64, now: DateTime<Utc>) -> Vec<Effect> {
    let expires_at = expiry_for(decision.ttl_ms, now);
    let mut effects = Vec::with_capacity(3);

    if let Some(learning) = decision.learning.as_ref().filter(|l| !l.is_empty()) {
        effects.push(Effect::ApplyLearning(learning.clone()));
    }
    if let Some(shift) = decision
        .personality_shift
        .filter(|s| *s != PersonalityShift::None)
    {
        effects.push(Effect::RecordPersonalityShift(shift));
    }

    let transient = decision
        .transient
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| TransientAction {
            color_shift: t.color_shift.clone().filter(|c| !c.is_empty()),
            jump: t.jump.unwrap_or(false),
            emphasis_light: t.light_pulse.unwrap_or(false),
            expires_at,
        });
    effects.push(Effect::WriteBehavior {
        behavior: Box::new(BehaviorState {
            decision: decision.clone(),
            expires_at,
            sequence,
        }),
        transient,
    });

    effects
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Sequences {
    issued: u64,
    applied: u64,
}

/// Turns context into decisions for every cube.
///
/// Shared between the frame loop and in-flight tick tasks via `Arc`.
pub struct Planner<I> {
    inference: I,
    prompts: PromptEngine,
    models: ModelTable,
    lore: LoreBook,
    registry: Arc<WorldRegistry>,
    memory: Arc<MemoryStore>,
    hints: Arc<IdentityHints>,
    sequences: Mutex<BTreeMap<AgentId, Sequences>>,
}

impl<I: Inference> Planner<I> {
    /// Create a planner over shared world state and memory.
    pub fn new(
        inference: I,
        prompts: PromptEngine,
        models: ModelTable,
        lore: LoreBook,
        registry: Arc<WorldRegistry>,
        memory: Arc<MemoryStore>,
        hints: Arc<IdentityHints>,
    ) -> Self {
        Self {
            inference,
            prompts,
            models,
            lore,
            registry,
            memory,
            hints,
            sequences: Mutex::new(BTreeMap::new()),
        }
    }

    /// The world registry decisions are written to.
    pub fn registry(&self) -> &Arc<WorldRegistry> {
        &self.registry
    }

    /// The memory store learning is written to.
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Identity hint counters.
    pub fn hints(&self) -> &Arc<IdentityHints> {
        &self.hints
    }

    /// Model table used to route requests.
    pub const fn models(&self) -> &ModelTable {
        &self.models
    }

    pub(crate) const fn prompts(&self) -> &PromptEngine {
        &self.prompts
    }

    pub(crate) const fn inference(&self) -> &I {
        &self.inference
    }

    /// Ask the model what cube `id` should do next.
    ///
    /// Returns the accepted decision after its effects have been applied,
    /// or `None` if no usable decision came back.
    pub async fn plan_behavior(
        &self,
        id: &AgentId,
        personality: Personality,
        context: &str,
    ) -> Option<BehaviorDecision> {
        let sequence = self.issue_sequence(id);
        let (request, hinted) = match self.decision_request(id, personality, context) {
            Ok(built) => built,
            Err(e) => {
                warn!(agent_id = %id, error = %e, "failed to build decision prompt");
                return None;
            }
        };

        let start = Instant::now();
        let raw = match self.inference.infer(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(agent_id = %id, model = %request.model, error = %e, "inference failed");
                return None;
            }
        };
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        if raw.trim().is_empty() {
            warn!(agent_id = %id, model = %request.model, latency_ms, "empty inference response");
            return None;
        }

        let decision = match parse_decision(&raw) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(agent_id = %id, model = %request.model, latency_ms, error = %e, "unusable decision");
                debug!(agent_id = %id, raw = %raw, "raw decision response");
                return None;
            }
        };

        if !self.accept_sequence(id, sequence) {
            warn!(agent_id = %id, sequence, "stale decision discarded");
            return None;
        }
        if hinted {
            self.hints.record(id);
        }

        info!(
            agent_id = %id,
            model = %request.model,
            latency_ms,
            sequence,
            goal = %decision.goal,
            intent = %decision.intent,
            "decision accepted"
        );

        let effects = plan_effects(&decision, sequence, Utc::now());
        self.apply_effects(id, effects);
        Some(decision)
    }

    /// Apply effects, logging and skipping any that fail. Returns how many
    /// were applied.
    pub fn apply_effects(&self, id: &AgentId, effects: Vec<Effect>) -> usize {
        let mut applied = 0_usize;
        for effect in effects {
            let ok = match effect {
                Effect::ApplyLearning(learning) => match self.memory.learn(id, &learning) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(agent_id = %id, error = %e, "learning not recorded");
                        false
                    }
                },
                Effect::RecordPersonalityShift(shift) => {
                    let Some(text) = shift_trait(shift) else {
                        continue;
                    };
                    let learning = LearningUpdate {
                        add_traits: vec![text.to_owned()],
                        ..LearningUpdate::default()
                    };
                    match self.memory.learn(id, &learning) {
                        Ok(_) => true,
                        Err(e) => {
                            warn!(agent_id = %id, error = %e, "personality shift not recorded");
                            false
                        }
                    }
                }
                Effect::WriteBehavior {
                    behavior,
                    transient,
                } => {
                    if self.registry.contains(id) {
                        self.registry.update(
                            id,
                            AgentStatePatch {
                                behavior: Some(*behavior),
                                transient,
                                ..AgentStatePatch::default()
                            },
                        );
                        true
                    } else {
                        debug!(agent_id = %id, "behavior for unregistered cube dropped");
                        false
                    }
                }
            };
            if ok {
                applied = applied.saturating_add(1);
            }
        }
        applied
    }

    /// The request for one decision, and whether its prompt carries the
    /// identity hint. The hint only counts once a decision is accepted.
    fn decision_request(
        &self,
        id: &AgentId,
        personality: Personality,
        context: &str,
    ) -> Result<(InferenceRequest, bool), RunnerError> {
        let state = self.registry.get(id);
        let memory = self.memory.get(id);

        let name = state
            .as_ref()
            .map(|s| s.name.clone())
            .or_else(|| memory.as_ref().map(|m| m.name.clone()))
            .unwrap_or_else(|| id.to_string());
        let position = state
            .as_ref()
            .map_or_else(|| "unknown".to_owned(), |s| s.position.to_string());
        let memory_context = memory
            .as_ref()
            .map(|m| self.memory.build_context(m))
            .unwrap_or_default();
        let lore = self.lore.render_context(context, DEFAULT_LORE_LIMIT);
        let identity_hint = self.hints.is_due(id);

        let prompt = self.prompts.render_decision(&DecisionPrompt {
            name: &name,
            personality: personality.as_str(),
            identity_hint,
            lore: &lore,
            memory: &memory_context,
            position: &position,
            context,
            min_ttl_ms: MIN_TTL_MS,
            max_ttl_ms: MAX_TTL_MS,
        })?;
        Ok((
            InferenceRequest::new(self.models.model_for(personality), prompt),
            identity_hint,
        ))
    }

    fn issue_sequence(&self, id: &AgentId) -> u64 {
        let Ok(mut sequences) = self.sequences.lock() else {
            return 0;
        };
        let entry = sequences.entry(id.clone()).or_default();
        entry.issued = entry.issued.saturating_add(1);
        entry.issued
    }

    /// Record `sequence` as applied unless a newer one already was.
    fn accept_sequence(&self, id: &AgentId, sequence: u64) -> bool {
        let Ok(mut sequences) = self.sequences.lock() else {
            return true;
        };
        let entry = sequences.entry(id.clone()).or_default();
        if sequence < entry.applied {
            return false;
        }
        entry.applied = sequence;
        true
    }
}
