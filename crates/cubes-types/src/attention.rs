//! Attention targets and candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::TargetKind;
use crate::state::Vec3;

/// Something in the world that could be looked at.
///
/// Candidates come from the world roster (books, zones, ambient points)
/// and from registry neighbor queries (other cubes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct AttentionCandidate {
    /// Kind of target.
    pub kind: TargetKind,
    /// Stable identifier within its kind.
    pub id: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Where it is.
    pub position: Vec3,
    /// Knowledge domain (books).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Difficulty in `[0, 1]` (books).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
}

/// A discovered point of interest, tracked in a cube's attention history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct AttentionTarget {
    /// Kind of target.
    pub kind: TargetKind,
    /// Stable identifier within its kind.
    pub id: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Where it was when discovered.
    pub position: Vec3,
    /// Interest level in `[0, 1]` at the last evaluation.
    pub interest: f64,
    /// First time the cube noticed it.
    pub discovered_at: DateTime<Utc>,
    /// Last time the cube finished a visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visited_at: Option<DateTime<Utc>>,
    /// Completed visits.
    #[serde(default)]
    pub visit_count: u32,
    /// Knowledge domain (books).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Difficulty in `[0, 1]` (books).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
}

impl AttentionTarget {
    /// Whether `self` and `other` denote the same thing in the world.
    pub fn same_target(&self, kind: TargetKind, id: &str) -> bool {
        self.kind == kind && self.id == id
    }
}
