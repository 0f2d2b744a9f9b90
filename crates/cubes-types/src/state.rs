//! Public per-cube state held by the world-state registry.
//!
//! [`AgentPublicState`] is what renderers, the attention model and the
//! social learning model read. Writers never mutate it in place; they hand
//! the registry an [`AgentStatePatch`] of whole replacement values.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::decision::BehaviorDecision;
use crate::enums::{Capability, Personality, SocialTrait};
use crate::ids::AgentId;

/// Tolerance used when comparing world coordinates.
const POSITION_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in world space, serialized as `[x, y, z]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vec3(pub f64, pub f64, pub f64);

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self(0.0, 0.0, 0.0);

    /// Construct a point.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self(x, y, z)
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.0 - other.0;
        let dy = self.1 - other.1;
        let dz = self.2 - other.2;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    /// Component-wise comparison within a small tolerance.
    pub fn approx_eq(self, other: Self) -> bool {
        (self.0 - other.0).abs() < POSITION_EPSILON
            && (self.1 - other.1).abs() < POSITION_EPSILON
            && (self.2 - other.2).abs() < POSITION_EPSILON
    }
}

impl core::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.0, self.1, self.2)
    }
}

// ---------------------------------------------------------------------------
// Time-limited effects
// ---------------------------------------------------------------------------

/// A named, time-limited tag that drives expressive rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ActiveModifier {
    /// Modifier name (`happy`, `serene`, ...).
    pub name: String,
    /// Instant after which the modifier must no longer be observed.
    pub expires_at: DateTime<Utc>,
}

impl ActiveModifier {
    /// Whether the modifier is still live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A one-shot effect (color change, jump, light pulse) with an expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TransientAction {
    /// Temporary body color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_shift: Option<String>,
    /// Hop in place.
    #[serde(default)]
    pub jump: bool,
    /// Flash the emphasis light.
    #[serde(default)]
    pub emphasis_light: bool,
    /// Instant after which the action must no longer be observed.
    pub expires_at: DateTime<Utc>,
}

impl TransientAction {
    /// Whether the action is still live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// The last committed decision with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BehaviorState {
    /// The decision as produced by the planner.
    pub decision: BehaviorDecision,
    /// Instant at which the decision stops applying.
    pub expires_at: DateTime<Utc>,
    /// Per-cube request sequence number the decision was issued under.
    pub sequence: u64,
}

impl BehaviorState {
    /// Whether the decision is still live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Compare the fields that renderers and change detection care about.
    pub fn same_headline(&self, other: &Self) -> bool {
        self.decision.goal == other.decision.goal
            && self.decision.intent == other.decision.intent
            && self.decision.mood == other.decision.mood
            && self.expires_at == other.expires_at
    }
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

/// Summary of what a cube has read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ReadingExperience {
    /// Number of books finished.
    pub books_read: u32,
    /// Total pages read.
    pub pages_read: u32,
    /// Title of the book read most recently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_book: Option<String>,
    /// Knowledge domain read most often.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_domain: Option<String>,
}

// ---------------------------------------------------------------------------
// AgentPublicState
// ---------------------------------------------------------------------------

/// Public state of a single cube, owned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct AgentPublicState {
    /// Identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Current position.
    pub position: Vec3,
    /// Personality archetype.
    pub personality: Personality,
    /// Social disposition.
    pub social_trait: SocialTrait,
    /// Capabilities the cube has acquired.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Partial progress toward capabilities, in `[0, 1]`.
    #[serde(default)]
    pub learning_progress: BTreeMap<Capability, f64>,
    /// Time-limited modifiers.
    #[serde(default)]
    pub modifiers: Vec<ActiveModifier>,
    /// Current one-shot effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transient: Option<TransientAction>,
    /// Last committed decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehaviorState>,
    /// Accumulated knowledge per domain.
    #[serde(default)]
    pub knowledge: BTreeMap<String, f64>,
    /// Reading summary.
    #[serde(default)]
    pub reading: ReadingExperience,
}

impl AgentPublicState {
    /// A fresh cube with no capabilities, knowledge or effects.
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        personality: Personality,
        social_trait: SocialTrait,
        position: Vec3,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            personality,
            social_trait,
            capabilities: BTreeSet::new(),
            learning_progress: BTreeMap::new(),
            modifiers: Vec::new(),
            transient: None,
            behavior: None,
            knowledge: BTreeMap::new(),
            reading: ReadingExperience::default(),
        }
    }

    /// Whether the cube has `capability`.
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Drop every modifier, transient action and behavior state that is
    /// no longer live at `now`. Returns how many entries were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.is_live(now));
        let mut removed = before.saturating_sub(self.modifiers.len());
        if self.transient.as_ref().is_some_and(|t| !t.is_live(now)) {
            self.transient = None;
            removed = removed.saturating_add(1);
        }
        if self.behavior.as_ref().is_some_and(|b| !b.is_live(now)) {
            self.behavior = None;
            removed = removed.saturating_add(1);
        }
        removed
    }

    /// Earliest expiry among the time-limited entries, if any.
    pub fn earliest_expiry(&self) -> Option<DateTime<Utc>> {
        self.modifiers
            .iter()
            .map(|m| m.expires_at)
            .chain(self.transient.as_ref().map(|t| t.expires_at))
            .chain(self.behavior.as_ref().map(|b| b.expires_at))
            .min()
    }
}

/// Partial update for [`AgentPublicState`].
///
/// Every field is a whole replacement value. `None` leaves the existing
/// value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStatePatch {
    /// New position.
    pub position: Option<Vec3>,
    /// New personality.
    pub personality: Option<Personality>,
    /// New social disposition.
    pub social_trait: Option<SocialTrait>,
    /// Replacement capability set.
    pub capabilities: Option<BTreeSet<Capability>>,
    /// Replacement learning progress.
    pub learning_progress: Option<BTreeMap<Capability, f64>>,
    /// Replacement modifier list.
    pub modifiers: Option<Vec<ActiveModifier>>,
    /// Replacement transient action.
    pub transient: Option<TransientAction>,
    /// Replacement behavior state.
    pub behavior: Option<BehaviorState>,
    /// Replacement knowledge map.
    pub knowledge: Option<BTreeMap<String, f64>>,
    /// Replacement reading summary.
    pub reading: Option<ReadingExperience>,
}

impl AgentStatePatch {
    /// A patch that changes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
