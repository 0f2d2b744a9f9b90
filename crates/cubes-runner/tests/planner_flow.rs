//! Integration tests for the planner, synthesis, ticks and persistence.
//!
//! Inference is replaced by a scripted stub that hands out canned replies
//! in order and records every request it sees, so each test controls
//! exactly what the "model" says.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Notify;

use cubes_agents::{IdentityHints, KeywordClassifier, MemoryDelta, MemoryStore};
use cubes_db::InMemoryStore;
use cubes_runner::archetype::ModelTable;
use cubes_runner::lore::{LoreBook, LoreFragment};
use cubes_runner::persistence::{load_state, save_state};
use cubes_runner::prompt::PromptEngine;
use cubes_runner::scheduler::perform_tick;
use cubes_runner::simulation::respond_to_user;
use cubes_runner::{Inference, InferenceRequest, Planner, RunnerError, SynthesisOutcome, UserMessage};
use cubes_types::{
    AgentId, AgentPublicState, Capability, IntentTag, Personality, SocialTrait, Vec3,
};
use cubes_world::WorldRegistry;

// ---------------------------------------------------------------------------
// Scripted inference
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Scripted {
    replies: Arc<Mutex<VecDeque<Result<String, RunnerError>>>>,
    requests: Arc<Mutex<Vec<InferenceRequest>>>,
    /// When set, the first call waits for this before answering.
    gate: Option<Arc<Notify>>,
}

impl Scripted {
    fn with(replies: Vec<Result<String, RunnerError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Inference for Scripted {
    async fn infer(&self, request: &InferenceRequest) -> Result<String, RunnerError> {
        let first = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() == 1
        };
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RunnerError::LlmBackend("script exhausted".to_owned())));
        if first {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
        reply
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn pip() -> AgentId {
    AgentId::from("cube-1")
}

fn registry() -> Arc<WorldRegistry> {
    let registry = Arc::new(WorldRegistry::new());
    registry.register(AgentPublicState::new(
        pip(),
        "Pip",
        Personality::Curious,
        SocialTrait::Kind,
        Vec3::new(1.0, 0.5, 2.0),
    ));
    registry
}

fn planner(inference: Scripted) -> Planner<Scripted> {
    let lore = LoreBook::new(vec![LoreFragment {
        id: "library".to_owned(),
        title: "The Quiet Library".to_owned(),
        text: "Books are stacked by the old wall.".to_owned(),
        keywords: vec!["book".to_owned(), "read".to_owned()],
    }]);
    let planner = Planner::new(
        inference,
        PromptEngine::builtin().expect("built-in templates"),
        ModelTable::default(),
        lore,
        registry(),
        Arc::new(MemoryStore::default()),
        Arc::new(IdentityHints::new(1)),
    );
    planner
        .memory()
        .initialize(&pip(), Personality::Curious, "Pip")
        .unwrap();
    planner
}

const GOOD_DECISION: &str = r##"{
    "goal": "find a good book",
    "intent": "roll toward the library wall",
    "target": {"type": "zone", "id": "library"},
    "transient": {"jump": true, "colorShift": "#32CD32"},
    "learning": {"addFacts": ["the library is by the old wall"]},
    "mood": "eager",
    "personalityShift": "more_curious",
    "ttlMs": 8000
}"##;

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepted_decision_updates_world_and_memory() {
    let stub = Scripted::with(vec![Ok(GOOD_DECISION.to_owned())]);
    let planner = planner(stub.clone());
    let before = Utc::now();

    let decision = planner
        .plan_behavior(&pip(), Personality::Curious, "I want to read a book")
        .await
        .expect("decision");
    assert_eq!(decision.goal, "find a good book");

    let state = planner.registry().get(&pip()).unwrap();
    let behavior = state.behavior.expect("behavior written");
    assert_eq!(behavior.sequence, 1);
    let ttl = behavior.expires_at.signed_duration_since(before).num_milliseconds();
    assert!((7_900..=8_500).contains(&ttl), "ttl was {ttl}");
    let transient = state.transient.expect("transient written");
    assert!(transient.jump);
    assert_eq!(transient.color_shift.as_deref(), Some("#32CD32"));
    assert_eq!(transient.expires_at, behavior.expires_at);

    let memory = planner.memory().get(&pip()).unwrap();
    assert!(memory.facts.contains(&"the library is by the old wall".to_owned()));
    assert!(memory.traits.contains(&"leaning more curious".to_owned()));
    assert_eq!(memory.stats.messages, 0, "learning does not count as a message");
    // The registry personality never changes from one decision.
    assert_eq!(
        planner.registry().get(&pip()).map(|s| s.personality),
        Some(Personality::Curious)
    );

    let requests = stub.requests();
    let request = requests.first().unwrap();
    assert_eq!(request.model, "qwen2.5:7b");
    assert!(request.system().contains("You have no hands"));
    let user = &request.messages.last().unwrap().content;
    assert!(user.contains("The Quiet Library"));
    assert!(user.contains("Position: (1.0, 0.5, 2.0)"));
    assert!(user.ends_with("I want to read a book"));
}

#[tokio::test]
async fn identity_hint_is_dropped_after_the_limit() {
    let stub = Scripted::with(vec![
        Ok(GOOD_DECISION.to_owned()),
        Ok(GOOD_DECISION.to_owned()),
    ]);
    let planner = planner(stub.clone());
    planner.plan_behavior(&pip(), Personality::Curious, "hi").await;
    planner.plan_behavior(&pip(), Personality::Curious, "hi").await;

    let requests = stub.requests();
    assert!(requests.first().unwrap().system().contains("You have no hands"));
    assert!(!requests.get(1).unwrap().system().contains("You have no hands"));
    assert_eq!(planner.hints().given(&pip()), 1);
}

#[tokio::test]
async fn identity_hint_counts_only_accepted_decisions() {
    let stub = Scripted::with(vec![
        Err(RunnerError::LlmBackend("connection refused".to_owned())),
        Ok("not json at all".to_owned()),
        Ok(GOOD_DECISION.to_owned()),
    ]);
    let planner = planner(stub.clone());
    for _ in 0..3 {
        planner.plan_behavior(&pip(), Personality::Curious, "hi").await;
    }

    let requests = stub.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.system().contains("You have no hands")));
    assert_eq!(planner.hints().given(&pip()), 1);
}

#[tokio::test]
async fn transport_failure_leaves_world_untouched() {
    let stub = Scripted::with(vec![Err(RunnerError::LlmBackend(
        "connection refused".to_owned(),
    ))]);
    let planner = planner(stub);
    let before = planner.registry().list_all();

    let decision = planner
        .plan_behavior(&pip(), Personality::Curious, "hello?")
        .await;
    assert!(decision.is_none());
    assert_eq!(planner.registry().list_all(), before);
}

#[tokio::test]
async fn decision_without_intent_is_rejected() {
    let stub = Scripted::with(vec![Ok(r#"{"goal": "wander", "mood": "bored"}"#.to_owned())]);
    let planner = planner(stub);

    let decision = planner
        .plan_behavior(&pip(), Personality::Curious, "what now?")
        .await;
    assert!(decision.is_none());
    assert!(planner.registry().get(&pip()).unwrap().behavior.is_none());
}

#[tokio::test]
async fn unknown_cube_plans_from_unknown_position() {
    let stub = Scripted::with(vec![Ok(GOOD_DECISION.to_owned())]);
    let planner = planner(stub.clone());
    let ghost = AgentId::from("cube-404");

    let decision = planner
        .plan_behavior(&ghost, Personality::Calm, "anyone there?")
        .await;
    assert!(decision.is_some());
    assert!(!planner.registry().contains(&ghost));

    let requests = stub.requests();
    let request = requests.first().unwrap();
    assert_eq!(request.model, "llama3.1:8b");
    assert!(request.messages.last().unwrap().content.contains("Position: unknown"));
}

#[tokio::test]
async fn stale_response_is_discarded() {
    let gate = Arc::new(Notify::new());
    let stub = Scripted {
        gate: Some(Arc::clone(&gate)),
        ..Scripted::with(vec![
            Ok(r#"{"goal": "old plan", "intent": "stale"}"#.to_owned()),
            Ok(r#"{"goal": "new plan", "intent": "fresh"}"#.to_owned()),
        ])
    };
    let planner = planner(stub);
    let pip_id = pip();

    let slow = planner.plan_behavior(&pip_id, Personality::Curious, "first");
    let fast = async {
        let decision = planner
            .plan_behavior(&pip_id, Personality::Curious, "second")
            .await;
        gate.notify_one();
        decision
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert!(slow.is_none(), "older response must be discarded");
    assert_eq!(fast.map(|d| d.goal), Some("new plan".to_owned()));
    let behavior = planner.registry().get(&pip_id).unwrap().behavior.unwrap();
    assert_eq!(behavior.decision.goal, "new plan");
    assert_eq!(behavior.sequence, 2);
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

fn interact(memory: &MemoryStore, times: usize, with_episode: bool) {
    for n in 0..times {
        memory
            .update(
                &pip(),
                MemoryDelta {
                    intent: Some(IntentTag::Statement),
                    episode_summary: with_episode.then(|| format!("chat number {n}")),
                    ..MemoryDelta::default()
                },
            )
            .unwrap();
    }
}

#[tokio::test]
async fn synthesis_waits_for_enough_episodes() {
    let stub = Scripted::default();
    let planner = planner(stub.clone());
    let memory = planner.memory();

    interact(memory, 2, true);
    interact(memory, 7, false);
    assert_eq!(planner.maybe_synthesize(&pip()).await, SynthesisOutcome::NotDue);

    interact(memory, 1, false);
    assert_eq!(
        planner.maybe_synthesize(&pip()).await,
        SynthesisOutcome::NotEnoughEpisodes
    );
    let stats = memory.get(&pip()).unwrap().stats;
    assert_eq!(stats.interactions_since_synthesis, 10);
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn synthesis_applies_and_resets_the_counter() {
    let stub = Scripted::with(vec![Ok(r#"```json
        {
            "summary": "Talking is fun.",
            "coreBeliefs": ["visitors are friendly"],
            "metaGoals": ["meet everyone"],
            "philosophyStatement": "Every hello is a gift.",
            "skillChanges": {"social": 0.1}
        }
        ```"#
        .to_owned())]);
    let planner = planner(stub.clone());
    let memory = planner.memory();
    let social_before = memory.get(&pip()).unwrap().skills.social;

    interact(memory, 10, true);
    assert_eq!(planner.maybe_synthesize(&pip()).await, SynthesisOutcome::Applied);

    let after = memory.get(&pip()).unwrap();
    assert_eq!(after.stats.interactions_since_synthesis, 0);
    assert_eq!(after.core_beliefs, vec!["visitors are friendly".to_owned()]);
    assert_eq!(after.philosophy.as_deref(), Some("Every hello is a gift."));
    assert_eq!(after.synthesis_history.len(), 1);
    assert!(after.skills.social > social_before);

    let requests = stub.requests();
    let user = &requests.first().unwrap().messages.last().unwrap().content;
    assert!(user.contains("chat number 9"));
}

#[tokio::test]
async fn failed_synthesis_changes_nothing() {
    let stub = Scripted::with(vec![Ok("I would rather not reflect today.".to_owned())]);
    let planner = planner(stub);
    let memory = planner.memory();
    interact(memory, 10, true);
    let before = memory.get(&pip()).unwrap();

    assert_eq!(planner.maybe_synthesize(&pip()).await, SynthesisOutcome::Failed);
    assert_eq!(memory.get(&pip()).unwrap(), before);
}

// ---------------------------------------------------------------------------
// Replies and ticks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_message_is_remembered_and_expressed() {
    let stub = Scripted::with(vec![Ok(r#"{
        "goal": "thank the visitor",
        "intent": "bounce happily",
        "mood": "happy"
    }"#
    .to_owned())]);
    let planner = planner(stub.clone());
    let message = UserMessage {
        agent_id: pip(),
        text: "You are so clever, I love you!".to_owned(),
    };

    let decision = respond_to_user(&planner, &KeywordClassifier, &message)
        .await
        .unwrap();
    assert_eq!(decision.map(|d| d.intent), Some("bounce happily".to_owned()));

    let memory = planner.memory().get(&pip()).unwrap();
    assert_eq!(memory.stats.messages, 1);
    assert_eq!(memory.stats.praises, 1);
    assert_eq!(memory.episodes.len(), 1);

    let state = planner.registry().get(&pip()).unwrap();
    assert!(state.modifiers.iter().any(|m| m.name == "happy"));
    assert!(state.transient.is_some_and(|t| t.jump));

    let requests = stub.requests();
    let user = &requests.first().unwrap().messages.last().unwrap().content;
    assert!(user.contains("Someone says to you: \"You are so clever, I love you!\""));
}

#[tokio::test]
async fn message_to_unknown_cube_is_an_error() {
    let planner = planner(Scripted::default());
    let message = UserMessage {
        agent_id: AgentId::from("cube-404"),
        text: "hello".to_owned(),
    };
    assert!(matches!(
        respond_to_user(&planner, &KeywordClassifier, &message).await,
        Err(RunnerError::Agent(_))
    ));
}

#[tokio::test]
async fn autonomous_tick_plans_from_introspection() {
    let stub = Scripted::with(vec![Ok(r#"{"goal": "look around", "intent": "observe the room"}"#.to_owned())]);
    let planner = planner(stub.clone());

    let decision = perform_tick(&planner, &pip(), "Not focused on anything in particular.").await;
    assert_eq!(decision.map(|d| d.goal), Some("look around".to_owned()));

    let state = planner.registry().get(&pip()).unwrap();
    assert!(state.modifiers.iter().any(|m| m.name == "observing"));

    let requests = stub.requests();
    let user = &requests.first().unwrap().messages.last().unwrap().content;
    assert!(user.contains("No one is talking to you right now."));
    assert!(user.contains("Not focused on anything in particular."));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn state_survives_a_save_and_load() {
    let store = InMemoryStore::new();
    let planner = planner(Scripted::default());
    interact(planner.memory(), 3, true);
    planner.hints().record(&pip());
    let mut capabilities = std::collections::BTreeSet::new();
    capabilities.insert(Capability::Navigation);
    planner.registry().update(
        &pip(),
        cubes_types::AgentStatePatch {
            position: Some(Vec3::new(4.0, 0.5, -1.0)),
            capabilities: Some(capabilities),
            ..cubes_types::AgentStatePatch::default()
        },
    );

    save_state(&store, planner.registry(), planner.memory(), planner.hints())
        .await
        .unwrap();

    let registry = registry();
    let memory = MemoryStore::default();
    let hints = IdentityHints::new(1);
    let report = load_state(&store, &registry, &memory, &hints).await.unwrap();
    assert_eq!(report.memories, 1);
    assert_eq!(report.cubes, 1);

    assert_eq!(memory.get(&pip()), planner.memory().get(&pip()));
    assert_eq!(hints.given(&pip()), 1);
    let restored = registry.get(&pip()).unwrap();
    assert_eq!(restored.position, Vec3::new(4.0, 0.5, -1.0));
    assert!(restored.has(Capability::Navigation));
    assert_eq!(restored.name, "Pip");
}

#[tokio::test]
async fn loading_from_an_empty_store_is_a_no_op() {
    let store = InMemoryStore::new();
    let registry = registry();
    let memory = MemoryStore::default();
    let hints = IdentityHints::new(1);
    let report = load_state(&store, &registry, &memory, &hints).await.unwrap();
    assert_eq!(report, cubes_runner::persistence::LoadReport::default());
    assert!(memory.get(&pip()).is_none());
}
