//! Memory synthesis: periodically consolidating episodes into beliefs.
//!
//! After every [`MemoryConfig::synthesis_interval`] interactions a cube
//! reflects on its most recent episodes. The model answers with a summary,
//! beliefs, goals, an optional philosophy and skill deltas, which the
//! memory store applies in one step. Any failure leaves the memory as it
//! was, so the next interaction simply tries again.
//!
//! [`MemoryConfig::synthesis_interval`]: cubes_agents::MemoryConfig

use tracing::{debug, info, warn};

use cubes_types::AgentId;

use crate::llm::{Inference, InferenceRequest};
use crate::parse::parse_synthesis;
use crate::planner::Planner;
use crate::prompt::SynthesisPrompt;

/// Episodes shown to the model in one synthesis pass.
pub const SYNTHESIS_EPISODES: usize = 10;

/// What [`Planner::maybe_synthesize`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// Not enough interactions since the last pass (or no memory).
    NotDue,
    /// Due, but too few episodes to reflect on.
    NotEnoughEpisodes,
    /// The pass ran and failed; memory is unchanged.
    Failed,
    /// The pass succeeded and the counter was reset.
    Applied,
}

impl<I: Inference> Planner<I> {
    /// Run a synthesis pass for `id` if one is due.
    pub async fn maybe_synthesize(&self, id: &AgentId) -> SynthesisOutcome {
        let store = self.memory();
        if !store.should_synthesize(id) {
            return SynthesisOutcome::NotDue;
        }
        let Some(memory) = store.get(id) else {
            return SynthesisOutcome::NotDue;
        };

        let episodes = store.recent_episodes(id, SYNTHESIS_EPISODES);
        if episodes.len() < store.config().min_synthesis_episodes {
            debug!(
                agent_id = %id,
                episodes = episodes.len(),
                "synthesis due but too few episodes"
            );
            return SynthesisOutcome::NotEnoughEpisodes;
        }

        let prompt = match self
            .prompts()
            .render_synthesis(&SynthesisPrompt::from_memory(&memory, &episodes))
        {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(agent_id = %id, error = %e, "failed to build synthesis prompt");
                return SynthesisOutcome::Failed;
            }
        };
        let request = InferenceRequest::new(self.models().model_for(memory.personality), prompt);

        let raw = match self.inference().infer(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(agent_id = %id, model = %request.model, error = %e, "synthesis inference failed");
                return SynthesisOutcome::Failed;
            }
        };
        let update = match parse_synthesis(&raw) {
            Ok(update) => update,
            Err(e) => {
                warn!(agent_id = %id, error = %e, "unusable synthesis response");
                return SynthesisOutcome::Failed;
            }
        };

        let considered = u32::try_from(episodes.len()).unwrap_or(u32::MAX);
        match store.apply_synthesis(id, update, considered) {
            Ok(memory) => {
                info!(
                    agent_id = %id,
                    episodes = considered,
                    beliefs = memory.core_beliefs.len(),
                    goals = memory.meta_goals.len(),
                    "memory synthesized"
                );
                SynthesisOutcome::Applied
            }
            Err(e) => {
                warn!(agent_id = %id, error = %e, "synthesis not applied");
                SynthesisOutcome::Failed
            }
        }
    }
}
