//! Autonomous thinking ticks.
//!
//! Every cube thinks on its own at a personality-dependent cadence:
//! restless personalities more often, calm ones less. Each interval is
//! jittered so the cubes do not think in lockstep. Cubes that were just
//! talked to are left alone for a quiet period so the autonomous tick does
//! not talk over the conversation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tracing::{debug, warn};

use cubes_agents::{apply_actions, derive_actions};
use cubes_types::{AgentId, AgentMemory, AgentPublicState, BehaviorDecision, Capability, Personality};

use crate::llm::Inference;
use crate::planner::Planner;

/// Shortest interval between autonomous thoughts, in seconds.
pub const MIN_INTERVAL_SECS: u32 = 8;

/// Longest interval between autonomous thoughts, in seconds.
pub const MAX_INTERVAL_SECS: u32 = 60;

/// Relative jitter applied to the base interval.
pub const INTERVAL_JITTER: f64 = 0.2;

/// Base interval between autonomous thoughts, in seconds.
pub const fn base_interval_secs(personality: Personality) -> u32 {
    match personality {
        Personality::Curious => 12,
        Personality::Chaotic => 15,
        Personality::Extrovert => 20,
        Personality::Neutral => 30,
        Personality::Calm => 45,
    }
}

/// A jittered thinking interval for `personality`.
pub fn thinking_interval(personality: Personality, rng: &mut impl Rng) -> Duration {
    let base = f64::from(base_interval_secs(personality));
    let jitter = rng.random_range(-INTERVAL_JITTER..=INTERVAL_JITTER);
    let secs = (base * (1.0 + jitter)).clamp(
        f64::from(MIN_INTERVAL_SECS),
        f64::from(MAX_INTERVAL_SECS),
    );
    Duration::from_secs_f64(secs)
}

/// Whether a cube that last thought at `last` should think at `now`.
///
/// A cube that has never thought is always due. Each call draws a fresh
/// interval; [`TickScheduler`] keeps one drawn deadline per cube instead.
pub fn should_think_now(
    last: Option<DateTime<Utc>>,
    personality: Personality,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> bool {
    let Some(last) = last else {
        return true;
    };
    let elapsed = now.signed_duration_since(last).to_std().unwrap_or_default();
    elapsed >= thinking_interval(personality, rng)
}

/// `at` shifted forward by `delay`, saturating at `at`.
fn after(at: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(at)
}

// ---------------------------------------------------------------------------
// Per-cube bookkeeping
// ---------------------------------------------------------------------------

/// When each cube last thought, when it thinks next, and when it was last
/// talked to.
#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    last_tick: BTreeMap<AgentId, DateTime<Utc>>,
    next_tick: BTreeMap<AgentId, DateTime<Utc>>,
    last_input: BTreeMap<AgentId, DateTime<Utc>>,
    quiet_period: Duration,
}

impl TickScheduler {
    /// A scheduler that holds back ticks for `quiet_period` after input.
    pub const fn new(quiet_period: Duration) -> Self {
        Self {
            last_tick: BTreeMap::new(),
            next_tick: BTreeMap::new(),
            last_input: BTreeMap::new(),
            quiet_period,
        }
    }

    /// Record that the user just talked to `id`.
    pub fn note_user_input(&mut self, id: &AgentId, now: DateTime<Utc>) {
        self.last_input.insert(id.clone(), now);
    }

    /// Whether `id` was talked to within the quiet period.
    pub fn in_quiet_period(&self, id: &AgentId, now: DateTime<Utc>) -> bool {
        self.last_input.get(id).is_some_and(|at| {
            match now.signed_duration_since(*at).to_std() {
                Ok(elapsed) => elapsed < self.quiet_period,
                // Input stamped after `now` counts as just now.
                Err(_) => true,
            }
        })
    }

    /// When `id` last thought.
    pub fn last_tick(&self, id: &AgentId) -> Option<DateTime<Utc>> {
        self.last_tick.get(id).copied()
    }

    /// When `id` is next due, once the scheduler has seen it.
    pub fn next_tick(&self, id: &AgentId) -> Option<DateTime<Utc>> {
        self.next_tick.get(id).copied()
    }

    /// Cubes that should think now. Each returned cube is recorded as
    /// having ticked at `now` and gets a freshly drawn deadline.
    ///
    /// A cube seen for the first time is scheduled somewhere within its
    /// first interval, so a roster loaded at once does not think in
    /// lockstep.
    pub fn due_agents(
        &mut self,
        cubes: impl IntoIterator<Item = (AgentId, Personality)>,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Vec<AgentId> {
        let mut due = Vec::new();
        for (id, personality) in cubes {
            if self.in_quiet_period(&id, now) {
                continue;
            }
            let deadline = match self.next_tick.get(&id) {
                Some(at) => *at,
                None => {
                    let offset = thinking_interval(personality, rng)
                        .mul_f64(rng.random_range(0.0..=1.0));
                    let first = after(now, offset);
                    self.next_tick.insert(id.clone(), first);
                    first
                }
            };
            if now >= deadline {
                let next = after(now, thinking_interval(personality, rng));
                self.last_tick.insert(id.clone(), now);
                self.next_tick.insert(id.clone(), next);
                due.push(id);
            }
        }
        due
    }
}

// ---------------------------------------------------------------------------
// The tick itself
// ---------------------------------------------------------------------------

/// Context for an autonomous thought, built from the cube's own state,
/// memory and attention.
pub fn introspective_context(
    state: &AgentPublicState,
    memory: Option<&AgentMemory>,
    attention: &str,
) -> String {
    let mut context = String::from("No one is talking to you right now. You have a moment to yourself.\n");
    let _ = writeln!(context, "You are at {}.", state.position);

    if let Some(behavior) = &state.behavior {
        let _ = writeln!(
            context,
            "You were last trying to {} ({}).",
            behavior.decision.goal, behavior.decision.intent
        );
    }
    if !attention.is_empty() {
        let _ = writeln!(context, "{attention}");
    }

    let missing: Vec<&str> = Capability::ALL
        .into_iter()
        .filter(|c| !state.has(*c))
        .map(Capability::as_str)
        .collect();
    if !missing.is_empty() {
        let _ = writeln!(context, "You have not yet learned: {}.", missing.join(", "));
    }
    if let Some(domain) = &state.reading.favorite_domain {
        let _ = writeln!(context, "You have been reading a lot about {domain}.");
    }

    if let Some(memory) = memory {
        if let Some(emotion) = memory.emotional_state.dominant_emotion {
            let _ = writeln!(context, "Lately you have been feeling {}.", emotion.as_str());
        }
        if let Some(episode) = memory.episodes.last() {
            let _ = writeln!(context, "The last thing that happened: {}.", episode.summary);
        }
    }

    context.push_str("What do you do next?");
    context
}

/// Run one autonomous thought for `id`: plan, then express.
///
/// Never fails; a cube that is not registered or gets no decision simply
/// does nothing this tick.
pub async fn perform_tick<I: Inference>(
    planner: &Planner<I>,
    id: &AgentId,
    attention: &str,
) -> Option<BehaviorDecision> {
    let Some(state) = planner.registry().get(id) else {
        debug!(agent_id = %id, "tick skipped: cube not registered");
        return None;
    };
    let memory = planner.memory().get(id);
    let context = introspective_context(&state, memory.as_ref(), attention);

    let decision = planner
        .plan_behavior(id, state.personality, &context)
        .await?;

    let actions = derive_actions(&decision.expressive_text(), memory.as_ref());
    if let Err(e) = apply_actions(planner.registry(), id, &actions) {
        warn!(agent_id = %id, error = %e, "tick actions not applied");
    }
    debug!(agent_id = %id, goal = %decision.goal, "autonomous tick complete");
    Some(decision)
}
