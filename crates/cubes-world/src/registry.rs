//! World-state registry: the single shared store of public cube state.
//!
//! The registry is injected into every component that reads or writes
//! public state (planner, action bridge, social learning, renderer
//! bridge). It is the only place that iterates and mutates modifier and
//! transient lists; callers always hand over whole replacement values in
//! an [`AgentStatePatch`].
//!
//! # Notification model
//!
//! Writes never call listeners directly. A write that changes at least
//! one tracked field raises a pending flag, and the frame loop calls
//! [`WorldRegistry::flush_notifications`] once per scheduling frame.
//! However many updates land in a frame, each listener runs at most once,
//! outside the registry lock, with the current snapshot.
//!
//! # Expiry
//!
//! Modifiers, transient actions and behavior states carry absolute expiry
//! instants. Expired entries are removed on every write to the owning
//! cube, by [`WorldRegistry::prune_expired`] (driven on a fixed cadence),
//! and before any read hands out state that would contain them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use cubes_types::{AgentId, AgentPublicState, AgentStatePatch, Vec3};

/// Callback invoked with the current snapshot after a frame with changes.
pub type Listener = Arc<dyn Fn(&[AgentPublicState]) + Send + Sync>;

/// Shared, cheaply clonable snapshot of every registered cube.
pub type Snapshot = Arc<[AgentPublicState]>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// In-memory store of each cube's public state with coalesced pub/sub.
///
/// All access is serialized by an internal mutex so the registry can be
/// shared via `Arc` between the frame loop and in-flight inference tasks.
/// A poisoned lock degrades every operation to a no-op rather than
/// panicking.
#[derive(Default)]
pub struct WorldRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    agents: BTreeMap<AgentId, AgentPublicState>,
    /// Cached snapshot; `None` means dirty.
    snapshot: Option<Snapshot>,
    /// Earliest expiry contained in the cached snapshot.
    earliest_expiry: Option<DateTime<Utc>>,
    pending_notify: bool,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
}

impl RegistryInner {
    fn mark_dirty(&mut self) {
        self.snapshot = None;
        self.earliest_expiry = None;
    }

    fn prune_all(&mut self, now: DateTime<Utc>) -> usize {
        self.agents
            .values_mut()
            .map(|state| state.prune(now))
            .fold(0_usize, usize::saturating_add)
    }

    /// Return the cached snapshot, rebuilding it if it is dirty or would
    /// expose an entry that has expired by `now`.
    fn snapshot_at(&mut self, now: DateTime<Utc>) -> Snapshot {
        let stale_expiry = self.earliest_expiry.is_some_and(|t| t <= now);
        if let Some(snapshot) = &self.snapshot
            && !stale_expiry
        {
            return Arc::clone(snapshot);
        }

        if self.prune_all(now) > 0 {
            self.pending_notify = true;
        }
        let snapshot: Snapshot = self.agents.values().cloned().collect();
        self.earliest_expiry = snapshot
            .iter()
            .filter_map(AgentPublicState::earliest_expiry)
            .min();
        self.snapshot = Some(Arc::clone(&snapshot));
        trace!(agents = snapshot.len(), "registry snapshot rebuilt");
        snapshot
    }

    /// Merge the patch `build` derives from the pruned state of `id`.
    /// `None` if the cube is unknown, otherwise whether a tracked field
    /// changed.
    fn merge_at(
        &mut self,
        id: &AgentId,
        now: DateTime<Utc>,
        build: impl FnOnce(&AgentPublicState) -> AgentStatePatch,
    ) -> Option<bool> {
        let current = self.agents.get_mut(id)?;

        let mut before = current.clone();
        let pruned = before.prune(now);

        let mut merged = before.clone();
        apply_patch(&mut merged, build(&before));
        merged.prune(now);

        let changed = tracked_fields_changed(&before, &merged);
        *current = merged;

        if changed || pruned > 0 {
            self.mark_dirty();
        }
        if changed {
            self.pending_notify = true;
        }
        Some(changed)
    }
}

impl WorldRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cube, replacing any previous state under the same id.
    pub fn register(&self, state: AgentPublicState) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        debug!(agent_id = %state.id, "cube registered");
        inner.agents.insert(state.id.clone(), state);
        inner.mark_dirty();
        inner.pending_notify = true;
    }

    /// Remove a cube. Returns its last state if it was registered.
    pub fn unregister(&self, id: &AgentId) -> Option<AgentPublicState> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        let removed = inner.agents.remove(id);
        if removed.is_some() {
            debug!(agent_id = %id, "cube unregistered");
            inner.mark_dirty();
            inner.pending_notify = true;
        }
        removed
    }

    /// Current state of a cube with expired entries removed.
    pub fn get(&self, id: &AgentId) -> Option<AgentPublicState> {
        self.get_at(id, Utc::now())
    }

    /// [`get`](Self::get) evaluated at an explicit instant.
    pub fn get_at(&self, id: &AgentId, now: DateTime<Utc>) -> Option<AgentPublicState> {
        let inner = self.inner.lock().ok()?;
        let mut state = inner.agents.get(id)?.clone();
        state.prune(now);
        Some(state)
    }

    /// Whether a cube is registered.
    pub fn contains(&self, id: &AgentId) -> bool {
        self.inner
            .lock()
            .is_ok_and(|inner| inner.agents.contains_key(id))
    }

    /// Number of registered cubes.
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.agents.len())
    }

    /// Whether no cube is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge a partial record into a cube's state.
    ///
    /// Returns `true` if at least one tracked field changed, in which case
    /// a notification is scheduled for the next frame flush. Updates to an
    /// unknown id are silently ignored.
    pub fn update(&self, id: &AgentId, patch: AgentStatePatch) -> bool {
        self.update_at(id, patch, Utc::now())
    }

    /// [`update`](Self::update) evaluated at an explicit instant.
    pub fn update_at(&self, id: &AgentId, patch: AgentStatePatch, now: DateTime<Utc>) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        inner.merge_at(id, now, |_| patch).unwrap_or_else(|| {
            debug!(agent_id = %id, "update for unknown cube ignored");
            false
        })
    }

    /// Read-modify-write under one lock: `build` sees the cube's current
    /// state (expired entries removed) and returns the patch to merge.
    ///
    /// Use this instead of [`get`](Self::get) followed by
    /// [`update`](Self::update) when the patch extends a list, so two
    /// writers cannot drop each other's entries. Returns `None` for an
    /// unknown id, otherwise whether a tracked field changed.
    pub fn modify(
        &self,
        id: &AgentId,
        build: impl FnOnce(&AgentPublicState) -> AgentStatePatch,
    ) -> Option<bool> {
        self.modify_at(id, Utc::now(), build)
    }

    /// [`modify`](Self::modify) evaluated at an explicit instant.
    pub fn modify_at(
        &self,
        id: &AgentId,
        now: DateTime<Utc>,
        build: impl FnOnce(&AgentPublicState) -> AgentStatePatch,
    ) -> Option<bool> {
        let mut inner = self.inner.lock().ok()?;
        inner.merge_at(id, now, build)
    }

    /// Snapshot of every registered cube, ordered by id.
    ///
    /// The snapshot is cached and only recomputed after a write (or when
    /// an entry inside it has expired).
    pub fn list_all(&self) -> Snapshot {
        self.list_all_at(Utc::now())
    }

    /// [`list_all`](Self::list_all) evaluated at an explicit instant.
    pub fn list_all_at(&self, now: DateTime<Utc>) -> Snapshot {
        let Ok(mut inner) = self.inner.lock() else {
            return Arc::from(Vec::new());
        };
        inner.snapshot_at(now)
    }

    /// Cubes other than `id` within `radius` of `position`.
    pub fn neighbors(&self, id: &AgentId, position: Vec3, radius: f64) -> Vec<AgentPublicState> {
        self.neighbors_at(id, position, radius, Utc::now())
    }

    /// [`neighbors`](Self::neighbors) evaluated at an explicit instant.
    pub fn neighbors_at(
        &self,
        id: &AgentId,
        position: Vec3,
        radius: f64,
        now: DateTime<Utc>,
    ) -> Vec<AgentPublicState> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner
            .agents
            .values()
            .filter(|state| state.id != *id && state.position.distance(position) <= radius)
            .map(|state| {
                let mut state = state.clone();
                state.prune(now);
                state
            })
            .collect()
    }

    /// Remove every expired modifier, transient action and behavior state.
    ///
    /// Idempotent. Returns how many entries were removed; a notification is
    /// scheduled only if that number is non-zero.
    pub fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now())
    }

    /// [`prune_expired`](Self::prune_expired) evaluated at an explicit instant.
    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let removed = inner.prune_all(now);
        if removed > 0 {
            trace!(removed, "expired entries pruned");
            inner.mark_dirty();
            inner.pending_notify = true;
        }
        removed
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: impl Fn(&[AgentPublicState]) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.lock().map_or(0, |mut inner| {
            let id = inner.next_listener_id;
            inner.next_listener_id = id.saturating_add(1);
            inner.listeners.push((id, Arc::new(listener)));
            id
        });
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// End of a scheduling frame: notify listeners once if anything changed.
    ///
    /// Returns `true` if listeners were invoked.
    pub fn flush_notifications(&self) -> bool {
        self.flush_notifications_at(Utc::now())
    }

    /// [`flush_notifications`](Self::flush_notifications) evaluated at an
    /// explicit instant.
    pub fn flush_notifications_at(&self, now: DateTime<Utc>) -> bool {
        let (snapshot, listeners) = {
            let Ok(mut inner) = self.inner.lock() else {
                return false;
            };
            if !inner.pending_notify {
                return false;
            }
            let snapshot = inner.snapshot_at(now);
            inner.pending_notify = false;
            let listeners: Vec<Listener> = inner
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            (snapshot, listeners)
        };

        for listener in &listeners {
            listener(&snapshot);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle for a registered listener; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade()
            && let Ok(mut inner) = inner.lock()
        {
            inner.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Merge & change detection
// ---------------------------------------------------------------------------

fn apply_patch(state: &mut AgentPublicState, patch: AgentStatePatch) {
    let AgentStatePatch {
        position,
        personality,
        social_trait,
        capabilities,
        learning_progress,
        modifiers,
        transient,
        behavior,
        knowledge,
        reading,
    } = patch;

    if let Some(position) = position {
        state.position = position;
    }
    if let Some(personality) = personality {
        state.personality = personality;
    }
    if let Some(social_trait) = social_trait {
        state.social_trait = social_trait;
    }
    if let Some(capabilities) = capabilities {
        state.capabilities = capabilities;
    }
    if let Some(learning_progress) = learning_progress {
        state.learning_progress = learning_progress;
    }
    if let Some(modifiers) = modifiers {
        state.modifiers = modifiers;
    }
    if let Some(transient) = transient {
        state.transient = Some(transient);
    }
    if let Some(behavior) = behavior {
        state.behavior = Some(behavior);
    }
    if let Some(knowledge) = knowledge {
        state.knowledge = knowledge;
    }
    if let Some(reading) = reading {
        state.reading = reading;
    }
}

/// Field-by-field comparison over the fields renderers observe.
fn tracked_fields_changed(before: &AgentPublicState, after: &AgentPublicState) -> bool {
    let behavior_changed = match (&before.behavior, &after.behavior) {
        (None, None) => false,
        (Some(a), Some(b)) => !a.same_headline(b),
        _ => true,
    };

    !before.position.approx_eq(after.position)
        || before.personality != after.personality
        || before.social_trait != after.social_trait
        || before.capabilities != after.capabilities
        || before.learning_progress != after.learning_progress
        || before.knowledge != after.knowledge
        || before.reading != after.reading
        || before.modifiers != after.modifiers
        || before.transient != after.transient
        || behavior_changed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration;
    use cubes_types::{
        ActiveModifier, BehaviorDecision, BehaviorState, Capability, Personality, SocialTrait,
        TransientAction,
    };

    use super::*;

    fn cube(id: &str, position: Vec3) -> AgentPublicState {
        AgentPublicState::new(
            AgentId::from(id),
            id,
            Personality::Neutral,
            SocialTrait::Kind,
            position,
        )
    }

    fn counting_listener(registry: &WorldRegistry) -> (Arc<AtomicUsize>, Subscription) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (calls, subscription)
    }

    fn modifier(name: &str, expires_at: DateTime<Utc>) -> ActiveModifier {
        ActiveModifier {
            name: name.to_owned(),
            expires_at,
        }
    }

    fn decision(goal: &str) -> BehaviorDecision {
        BehaviorDecision {
            goal: goal.to_owned(),
            intent: "wander".to_owned(),
            target: None,
            transient: None,
            learning: None,
            mood: None,
            personality_shift: None,
            ttl_ms: None,
        }
    }

    #[test]
    fn register_and_get() {
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        assert!(registry.contains(&AgentId::from("a")));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&AgentId::from("missing")).is_none());
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let registry = WorldRegistry::new();
        let changed = registry.update(
            &AgentId::from("ghost"),
            AgentStatePatch {
                position: Some(Vec3::new(1.0, 0.0, 0.0)),
                ..AgentStatePatch::default()
            },
        );
        assert!(!changed);
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_update_never_notifies() {
        let now = Utc::now();
        let registry = WorldRegistry::new();
        let mut state = cube("a", Vec3::ZERO);
        state.modifiers = vec![
            modifier("stale", now - Duration::seconds(2)),
            modifier("live", now + Duration::seconds(2)),
        ];
        registry.register(state);
        let (calls, _sub) = counting_listener(&registry);
        registry.flush_notifications_at(now);
        calls.store(0, Ordering::SeqCst);

        assert!(!registry.update_at(&AgentId::from("a"), AgentStatePatch::empty(), now));
        assert!(!registry.flush_notifications_at(now));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // The stale modifier is gone even though nobody was notified.
        let state = registry.get_at(&AgentId::from("a"), now);
        assert_eq!(state.map(|s| s.modifiers.len()), Some(1));
    }

    #[test]
    fn identical_position_write_is_not_a_change() {
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::new(1.0, 2.0, 3.0)));
        registry.flush_notifications();
        let changed = registry.update(
            &AgentId::from("a"),
            AgentStatePatch {
                position: Some(Vec3::new(1.0, 2.0, 3.0)),
                ..AgentStatePatch::default()
            },
        );
        assert!(!changed);
    }

    #[test]
    fn notifications_coalesce_per_frame() {
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        let (calls, _sub) = counting_listener(&registry);

        for step in 1..=5 {
            let x = f64::from(step);
            registry.update(
                &AgentId::from("a"),
                AgentStatePatch {
                    position: Some(Vec3::new(x, 0.0, 0.0)),
                    ..AgentStatePatch::default()
                },
            );
        }
        assert!(registry.flush_notifications());
        assert!(!registry.flush_notifications());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_sees_latest_snapshot() {
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = registry.subscribe(move |snapshot| {
            if let Ok(mut sink) = sink.lock() {
                sink.push(snapshot.iter().map(|s| s.position.0).sum::<f64>());
            }
        });
        registry.update(
            &AgentId::from("a"),
            AgentStatePatch {
                position: Some(Vec3::new(4.0, 0.0, 0.0)),
                ..AgentStatePatch::default()
            },
        );
        registry.flush_notifications();
        let seen = seen.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(seen.len(), 1);
        assert!((seen.first().copied().unwrap_or_default() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dropped_subscription_stops_notifications() {
        let registry = WorldRegistry::new();
        let (calls, sub) = counting_listener(&registry);
        sub.unsubscribe();
        registry.register(cube("a", Vec3::ZERO));
        registry.flush_notifications();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snapshot_is_cached_until_write() {
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        let first = registry.list_all();
        let second = registry.list_all();
        assert!(Arc::ptr_eq(&first, &second));

        registry.update(
            &AgentId::from("a"),
            AgentStatePatch {
                capabilities: Some([Capability::Navigation].into_iter().collect()),
                ..AgentStatePatch::default()
            },
        );
        let third = registry.list_all();
        assert!(!Arc::ptr_eq(&second, &third));
        assert!(third.iter().all(|s| s.has(Capability::Navigation)));
    }

    #[test]
    fn snapshot_never_exposes_expired_entries() {
        let now = Utc::now();
        let registry = WorldRegistry::new();
        let mut state = cube("a", Vec3::ZERO);
        state.modifiers = vec![modifier("brief", now + Duration::seconds(1))];
        registry.register(state);

        let early = registry.list_all_at(now);
        assert_eq!(early.first().map(|s| s.modifiers.len()), Some(1));

        let later = registry.list_all_at(now + Duration::seconds(2));
        assert_eq!(later.first().map(|s| s.modifiers.len()), Some(0));
    }

    #[test]
    fn prune_is_idempotent_and_complete() {
        let now = Utc::now();
        let registry = WorldRegistry::new();
        let mut state = cube("a", Vec3::ZERO);
        state.modifiers = vec![
            modifier("x", now - Duration::milliseconds(1)),
            modifier("y", now),
            modifier("z", now + Duration::seconds(5)),
        ];
        state.transient = Some(TransientAction {
            color_shift: Some("#fff".to_owned()),
            jump: false,
            emphasis_light: false,
            expires_at: now - Duration::seconds(1),
        });
        state.behavior = Some(BehaviorState {
            decision: decision("rest"),
            expires_at: now,
            sequence: 1,
        });
        registry.register(state);
        registry.flush_notifications_at(now);

        assert_eq!(registry.prune_expired_at(now), 4);
        assert!(registry.flush_notifications_at(now));
        assert_eq!(registry.prune_expired_at(now), 0);
        assert!(!registry.flush_notifications_at(now));

        let snapshot = registry.list_all_at(now);
        for state in snapshot.iter() {
            assert!(state.modifiers.iter().all(|m| m.expires_at > now));
            assert!(state.transient.is_none());
            assert!(state.behavior.is_none());
        }
    }

    #[test]
    fn incoming_expired_modifiers_are_filtered() {
        let now = Utc::now();
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        registry.update_at(
            &AgentId::from("a"),
            AgentStatePatch {
                modifiers: Some(vec![
                    modifier("dead", now - Duration::seconds(1)),
                    modifier("alive", now + Duration::seconds(1)),
                ]),
                ..AgentStatePatch::default()
            },
            now,
        );
        let state = registry.get_at(&AgentId::from("a"), now);
        let names: Vec<String> = state
            .map(|s| s.modifiers.into_iter().map(|m| m.name).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["alive".to_owned()]);
    }

    #[test]
    fn behavior_headline_change_notifies() {
        let now = Utc::now();
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        let expires_at = now + Duration::seconds(6);
        let write = |goal: &str, sequence: u64| {
            registry.update_at(
                &AgentId::from("a"),
                AgentStatePatch {
                    behavior: Some(BehaviorState {
                        decision: decision(goal),
                        expires_at,
                        sequence,
                    }),
                    ..AgentStatePatch::default()
                },
                now,
            )
        };
        assert!(write("explore", 1));
        // Same headline under a new sequence is not a visible change.
        assert!(!write("explore", 2));
        assert!(write("read", 3));
    }

    #[test]
    fn neighbors_excludes_self_and_distant() {
        let registry = WorldRegistry::new();
        registry.register(cube("me", Vec3::ZERO));
        registry.register(cube("near", Vec3::new(3.0, 0.0, 0.0)));
        registry.register(cube("edge", Vec3::new(0.0, 0.0, 5.0)));
        registry.register(cube("far", Vec3::new(50.0, 0.0, 0.0)));

        let ids: Vec<String> = registry
            .neighbors(&AgentId::from("me"), Vec3::ZERO, 5.0)
            .into_iter()
            .map(|s| s.id.0)
            .collect();
        assert_eq!(ids, vec!["edge".to_owned(), "near".to_owned()]);
    }

    #[test]
    fn unregister_then_update_is_noop() {
        let registry = WorldRegistry::new();
        registry.register(cube("a", Vec3::ZERO));
        assert!(registry.unregister(&AgentId::from("a")).is_some());
        assert!(!registry.update(
            &AgentId::from("a"),
            AgentStatePatch {
                position: Some(Vec3::new(1.0, 1.0, 1.0)),
                ..AgentStatePatch::default()
            },
        ));
        assert!(registry.unregister(&AgentId::from("a")).is_none());
    }

    #[test]
    fn modify_builds_on_current_state() {
        let registry = WorldRegistry::new();
        let id = AgentId::from("cube-1");
        let now = Utc::now();
        let mut state = cube("cube-1", Vec3::default());
        state.modifiers = vec![
            modifier("old", now - Duration::seconds(1)),
            modifier("happy", now + Duration::seconds(4)),
        ];
        registry.register(state);

        let changed = registry.modify_at(&id, now, |current| {
            let mut modifiers = current.modifiers.clone();
            modifiers.push(modifier("observing", now + Duration::seconds(4)));
            AgentStatePatch {
                modifiers: Some(modifiers),
                ..AgentStatePatch::default()
            }
        });
        assert_eq!(changed, Some(true));

        let names: Vec<String> = registry
            .get_at(&id, now)
            .map(|s| s.modifiers.into_iter().map(|m| m.name).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["happy", "observing"]);

        let unknown = registry.modify_at(&AgentId::from("ghost"), now, |_| AgentStatePatch::default());
        assert_eq!(unknown, None);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let registry = WorldRegistry::new();
        let id = AgentId::from("cube-1");
        registry.register(cube("cube-1", Vec3::default()));
        let now = Utc::now();

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let registry = &registry;
                let id = &id;
                scope.spawn(move || {
                    for n in 0..25 {
                        registry.modify_at(id, now, |current| {
                            let mut modifiers = current.modifiers.clone();
                            modifiers.push(modifier(
                                &format!("w{writer}-{n}"),
                                now + Duration::seconds(60),
                            ));
                            AgentStatePatch {
                                modifiers: Some(modifiers),
                                ..AgentStatePatch::default()
                            }
                        });
                    }
                });
            }
        });

        let count = registry.get_at(&id, now).map_or(0, |s| s.modifiers.len());
        assert_eq!(count, 100);
    }
}
