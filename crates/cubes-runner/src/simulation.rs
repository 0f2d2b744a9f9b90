//! The simulation loop.
//!
//! One task owns scheduling. It wakes on a handful of fixed cadences and
//! on user input:
//!
//! | Arm      | Work                                                        |
//! |----------|-------------------------------------------------------------|
//! | frame    | attention step per cube, spawn due ticks, flush listeners   |
//! | prune    | drop expired modifiers, transients and behaviors            |
//! | social   | one social learning draw per cube                           |
//! | save     | persist memory, identity hints and dynamic registry state   |
//! | inbox    | spawn a reply to a user message                             |
//! | shutdown | wait for in-flight tasks, save once more, return            |
//!
//! Inference never runs on the loop itself. Replies and autonomous ticks
//! are spawned tasks sharing the planner through an `Arc`; a cube with a
//! task in flight is not scheduled for another tick until it finishes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

use cubes_agents::{
    AgentError, IntentClassifier, MemoryDelta, MemoryStore, apply_actions, derive_actions,
    social_learning_step,
};
use cubes_db::KeyValueStore;
use cubes_types::{AgentId, BehaviorDecision};
use cubes_world::{AttentionState, AttentionStep, WorldRegistry};

use crate::config::LoopTiming;
use crate::error::RunnerError;
use crate::llm::Inference;
use crate::persistence::save_state;
use crate::planner::Planner;
use crate::scheduler::{TickScheduler, perform_tick};
use crate::synthesis::SynthesisOutcome;
use crate::world::WorldFile;

/// Longest excerpt of a user message kept in an episode summary.
const EPISODE_EXCERPT_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// A message from the user to one cube.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    /// Addressee.
    pub agent_id: AgentId,
    /// What was said.
    pub text: String,
}

/// Parse a console line of the form `cube-1: hello there`.
pub fn parse_console_line(line: &str) -> Option<UserMessage> {
    let (id, text) = line.split_once(':')?;
    let id = id.trim();
    let text = text.trim();
    if id.is_empty() || text.is_empty() {
        return None;
    }
    Some(UserMessage {
        agent_id: AgentId::from(id),
        text: text.to_owned(),
    })
}

/// Make sure every registered cube has a memory. Returns how many were
/// registered (seeded or already present).
pub fn seed_memories(registry: &WorldRegistry, memory: &MemoryStore) -> usize {
    let mut seeded = 0_usize;
    for state in registry.list_all().iter() {
        match memory.initialize(&state.id, state.personality, &state.name) {
            Ok(_) => seeded = seeded.saturating_add(1),
            Err(e) => warn!(agent_id = %state.id, error = %e, "memory not seeded"),
        }
    }
    seeded
}

/// Respond to a user message.
///
/// Records the interaction in memory, asks the planner for a reaction,
/// expresses it, and runs a synthesis pass if one is due.
///
/// # Errors
///
/// Returns [`RunnerError::Agent`] if the cube is not registered or its
/// memory cannot be written. A missing decision is `Ok(None)`.
pub async fn respond_to_user<I: Inference>(
    planner: &Planner<I>,
    classifier: &dyn IntentClassifier,
    message: &UserMessage,
) -> Result<Option<BehaviorDecision>, RunnerError> {
    let id = &message.agent_id;
    let state = planner
        .registry()
        .get(id)
        .ok_or_else(|| AgentError::AgentNotFound(id.clone()))?;

    let classification = classifier.classify(&message.text);
    let store = planner.memory();
    store.initialize(id, state.personality, &state.name)?;
    let memory = store.update(
        id,
        MemoryDelta {
            intent: Some(classification.intent),
            emotion: classification.emotion,
            user_message: Some(message.text.clone()),
            episode_summary: Some(episode_summary(&state.name, &message.text)),
            ..MemoryDelta::default()
        },
    )?;
    debug!(
        agent_id = %id,
        intent = ?classification.intent,
        emotion = ?classification.emotion,
        concepts = ?classification.concepts,
        "user message classified"
    );

    let context = match classification.emotion {
        Some(emotion) => format!(
            "Someone says to you: \"{}\"\nThey sound {}.",
            message.text.trim(),
            emotion.as_str()
        ),
        None => format!("Someone says to you: \"{}\"", message.text.trim()),
    };

    let decision = planner
        .plan_behavior(id, state.personality, &context)
        .await;
    if let Some(decision) = &decision {
        let actions = derive_actions(&decision.expressive_text(), Some(&memory));
        if let Err(e) = apply_actions(planner.registry(), id, &actions) {
            warn!(agent_id = %id, error = %e, "reply actions not applied");
        }
    }

    match planner.maybe_synthesize(id).await {
        SynthesisOutcome::NotDue => {}
        outcome => info!(agent_id = %id, ?outcome, "synthesis pass"),
    }
    Ok(decision)
}

fn episode_summary(name: &str, text: &str) -> String {
    let trimmed = text.trim();
    let excerpt: String = trimmed.chars().take(EPISODE_EXCERPT_CHARS).collect();
    if excerpt.len() < trimmed.len() {
        format!("{name} was told \"{excerpt}...\"")
    } else {
        format!("{name} was told \"{excerpt}\"")
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Everything the loop needs, owned by the loop task.
pub struct Simulation<I, S> {
    planner: Arc<Planner<I>>,
    classifier: Arc<dyn IntentClassifier>,
    store: S,
    world: WorldFile,
    timing: LoopTiming,
    social_radius: f64,
    scheduler: TickScheduler,
    attention: BTreeMap<AgentId, AttentionState>,
    tasks: Vec<(AgentId, JoinHandle<()>)>,
    rng: SmallRng,
}

impl<I, S> Simulation<I, S>
where
    I: Inference + 'static,
    S: KeyValueStore,
{
    /// Assemble a simulation around a planner and a state store.
    pub fn new(
        planner: Arc<Planner<I>>,
        classifier: Arc<dyn IntentClassifier>,
        store: S,
        world: WorldFile,
        timing: LoopTiming,
        social_radius: f64,
    ) -> Self {
        Self {
            planner,
            classifier,
            store,
            world,
            timing,
            social_radius,
            scheduler: TickScheduler::new(timing.quiet_period),
            attention: BTreeMap::new(),
            tasks: Vec::new(),
            rng: SmallRng::from_os_rng(),
        }
    }

    /// The shared planner.
    pub const fn planner(&self) -> &Arc<Planner<I>> {
        &self.planner
    }

    /// The state store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Run until `shutdown` resolves. A closed inbox only stops input.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Db`] if the final save fails. Periodic save
    /// failures are logged and retried on the next cadence.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<UserMessage>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RunnerError> {
        let mut frame = interval(self.timing.frame);
        let mut prune = interval(self.timing.prune);
        let mut social = interval(self.timing.social);
        let mut save = interval(self.timing.save);
        for timer in [&mut frame, &mut prune, &mut social, &mut save] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }
        // The first tick of an interval fires immediately; nothing to save yet.
        save.reset();
        tokio::pin!(shutdown);
        let mut inbox_open = true;

        info!(
            cubes = self.planner.registry().len(),
            frame_ms = u64::try_from(self.timing.frame.as_millis()).unwrap_or(u64::MAX),
            "simulation started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                message = inbox.recv(), if inbox_open => {
                    match message {
                        Some(message) => self.dispatch_message(message),
                        None => {
                            info!("input closed, cubes carry on alone");
                            inbox_open = false;
                        }
                    }
                }
                _ = frame.tick() => self.frame(),
                _ = prune.tick() => {
                    let removed = self.planner.registry().prune_expired();
                    if removed > 0 {
                        trace!(removed, "expired entries pruned");
                    }
                }
                _ = social.tick() => self.social_round(),
                _ = save.tick() => {
                    if let Err(e) = self.save().await {
                        warn!(error = %e, "periodic save failed");
                    }
                }
            }
        }

        self.finish().await
    }

    /// Spawn a reply to `message`.
    pub fn dispatch_message(&mut self, message: UserMessage) {
        let now = Utc::now();
        if !self.planner.registry().contains(&message.agent_id) {
            warn!(agent_id = %message.agent_id, "message for unknown cube dropped");
            return;
        }
        self.scheduler.note_user_input(&message.agent_id, now);

        let planner = Arc::clone(&self.planner);
        let classifier = Arc::clone(&self.classifier);
        let id = message.agent_id.clone();
        let handle = tokio::spawn(async move {
            match respond_to_user(&planner, classifier.as_ref(), &message).await {
                Ok(Some(decision)) => {
                    info!(agent_id = %message.agent_id, intent = %decision.intent, "cube replied");
                }
                Ok(None) => debug!(agent_id = %message.agent_id, "no reply this time"),
                Err(e) => warn!(agent_id = %message.agent_id, error = %e, "reply failed"),
            }
        });
        self.tasks.push((id, handle));
    }

    /// One scheduling frame.
    pub fn frame(&mut self) {
        let now = Utc::now();
        let registry = Arc::clone(self.planner.registry());
        let snapshot = registry.list_all();

        for state in snapshot.iter() {
            let candidates = self.world.candidates_for(&state.id, &snapshot);
            let attention = self.attention.entry(state.id.clone()).or_default();
            let step = attention.step(state.position, state.personality, &candidates, now);
            if matches!(step, AttentionStep::Focused | AttentionStep::Switched) {
                debug!(
                    agent_id = %state.id,
                    focus = attention.focus.as_ref().map_or("", |f| f.id.as_str()),
                    "attention shifted"
                );
            }
        }

        self.tasks.retain(|(_, handle)| !handle.is_finished());
        let idle: Vec<_> = snapshot
            .iter()
            .filter(|s| !self.tasks.iter().any(|(id, _)| *id == s.id))
            .map(|s| (s.id.clone(), s.personality))
            .collect();
        for id in self.scheduler.due_agents(idle, now, &mut self.rng) {
            let summary = self
                .attention
                .get(&id)
                .map(|a| a.describe(now))
                .unwrap_or_default();
            let planner = Arc::clone(&self.planner);
            let task_id = id.clone();
            let handle = tokio::spawn(async move {
                perform_tick(&planner, &task_id, &summary).await;
            });
            self.tasks.push((id, handle));
        }

        registry.flush_notifications();
    }

    /// One social learning draw per cube.
    pub fn social_round(&mut self) {
        let registry = Arc::clone(self.planner.registry());
        let ids: Vec<AgentId> = registry.list_all().iter().map(|s| s.id.clone()).collect();
        for id in ids {
            if let Some(event) = social_learning_step(&registry, &id, self.social_radius, &mut self.rng) {
                debug!(agent_id = %id, ?event, "social learning");
            }
        }
    }

    /// Persist current state.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Db`] if the store rejects a write.
    pub async fn save(&self) -> Result<(), RunnerError> {
        save_state(
            &self.store,
            self.planner.registry(),
            self.planner.memory(),
            self.planner.hints(),
        )
        .await
    }

    async fn finish(mut self) -> Result<(), RunnerError> {
        let pending: Vec<JoinHandle<()>> = self.tasks.drain(..).map(|(_, h)| h).collect();
        if !pending.is_empty() {
            info!(tasks = pending.len(), "waiting for in-flight tasks");
        }
        for result in futures::future::join_all(pending).await {
            if let Err(e) = result {
                warn!(error = %e, "task ended abnormally");
            }
        }
        self.save().await?;
        info!("simulation stopped");
        Ok(())
    }
}
