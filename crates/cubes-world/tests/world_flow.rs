//! Integration tests for registry and attention working together.
//!
//! A cube discovers neighbors through the registry, scores them with the
//! attention model, and its expressive state expires through pruning.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use cubes_types::{
    ActiveModifier, AgentId, AgentPublicState, AgentStatePatch, AttentionCandidate, Personality,
    SocialTrait, TargetKind, TransientAction, Vec3,
};
use cubes_world::{AttentionState, AttentionStep, WorldRegistry};

fn cube(id: &str, personality: Personality, position: Vec3) -> AgentPublicState {
    AgentPublicState::new(AgentId::from(id), id, personality, SocialTrait::Kind, position)
}

fn as_candidates(states: &[AgentPublicState]) -> Vec<AttentionCandidate> {
    states
        .iter()
        .map(|s| AttentionCandidate {
            kind: TargetKind::Cube,
            id: s.id.to_string(),
            label: s.name.clone(),
            position: s.position,
            domain: None,
            difficulty: None,
        })
        .collect()
}

#[test]
fn extrovert_focuses_on_nearest_neighbor() {
    let registry = WorldRegistry::new();
    registry.register(cube("host", Personality::Extrovert, Vec3::ZERO));
    registry.register(cube("close", Personality::Calm, Vec3::new(2.0, 0.0, 0.0)));
    registry.register(cube("distant", Personality::Calm, Vec3::new(9.0, 0.0, 0.0)));
    registry.register(cube("gone", Personality::Calm, Vec3::new(500.0, 0.0, 0.0)));

    let neighbors = registry.neighbors(&AgentId::from("host"), Vec3::ZERO, 10.0);
    assert_eq!(neighbors.len(), 2);

    let mut attention = AttentionState::default();
    let step = attention.step(
        Vec3::ZERO,
        Personality::Extrovert,
        &as_candidates(&neighbors),
        Utc::now(),
    );
    assert_eq!(step, AttentionStep::Focused);
    assert_eq!(attention.focus.unwrap().id, "close");
}

#[test]
fn expressive_state_expires_with_one_notification() {
    let now = Utc::now();
    let registry = WorldRegistry::new();
    registry.register(cube("a", Personality::Curious, Vec3::ZERO));

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let _subscription = registry.subscribe(move |snapshot| {
        assert_eq!(snapshot.len(), 1);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let expiry = now + Duration::seconds(4);
    registry.update_at(
        &AgentId::from("a"),
        AgentStatePatch {
            modifiers: Some(vec![ActiveModifier {
                name: "happy".to_owned(),
                expires_at: expiry,
            }]),
            transient: Some(TransientAction {
                color_shift: Some("#FFD700".to_owned()),
                jump: true,
                emphasis_light: false,
                expires_at: expiry,
            }),
            ..AgentStatePatch::default()
        },
        now,
    );
    assert!(registry.flush_notifications_at(now));

    let after = now + Duration::seconds(5);
    assert_eq!(registry.prune_expired_at(after), 2);
    assert!(registry.flush_notifications_at(after));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let state = registry.get_at(&AgentId::from("a"), after).unwrap();
    assert!(state.modifiers.is_empty());
    assert!(state.transient.is_none());
}
