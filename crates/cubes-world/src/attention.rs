//! Attention model: interest scoring, target selection and boredom.
//!
//! Everything here is a pure function of its inputs except
//! [`AttentionState::step`], which owns one cube's focus and visit history.
//! Scores are in `[0, 1]`. Distance decays interest smoothly with
//! `1 / (1 + d / 25)`, so distant but novel targets stay reachable.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::trace;

use cubes_types::{AttentionCandidate, AttentionTarget, Personality, TargetKind, Vec3};

/// Minimum interest a candidate must exceed to be selected.
pub const MIN_INTEREST: f64 = 0.15;

/// Bonus for a target the cube has never visited.
pub const NOVELTY_BONUS: f64 = 0.3;

/// Penalty per completed visit.
pub const VISIT_PENALTY_STEP: f64 = 0.15;

/// Upper bound on the accumulated visit penalty.
pub const VISIT_PENALTY_CAP: f64 = 0.6;

/// Distance at which interest has fallen to one half.
pub const DISTANCE_HALF_LIFE: f64 = 25.0;

/// Interest below which boredom sets in twice as fast.
pub const LOW_INTEREST: f64 = 0.4;

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Base appeal of a target kind for a personality.
#[allow(clippy::match_same_arms)] // one row per personality, kept as a table
pub const fn personality_weight(kind: TargetKind, personality: Personality) -> f64 {
    match (personality, kind) {
        (_, TargetKind::None) => 0.0,

        (Personality::Calm, TargetKind::Book) => 0.6,
        (Personality::Calm, TargetKind::Zone) => 0.4,
        (Personality::Calm, TargetKind::Cube) => 0.2,
        (Personality::Calm, TargetKind::Ambient) => 0.5,

        (Personality::Extrovert, TargetKind::Book) => 0.2,
        (Personality::Extrovert, TargetKind::Zone) => 0.4,
        (Personality::Extrovert, TargetKind::Cube) => 0.7,
        (Personality::Extrovert, TargetKind::Ambient) => 0.3,

        (Personality::Curious, TargetKind::Book) => 0.7,
        (Personality::Curious, TargetKind::Zone) => 0.5,
        (Personality::Curious, TargetKind::Cube | TargetKind::Ambient) => 0.4,

        (Personality::Chaotic, TargetKind::Book | TargetKind::Cube) => 0.5,
        (Personality::Chaotic, TargetKind::Zone | TargetKind::Ambient) => 0.6,

        (Personality::Neutral, TargetKind::Book | TargetKind::Zone | TargetKind::Cube) => 0.4,
        (Personality::Neutral, TargetKind::Ambient) => 0.3,
    }
}

/// Interest in a target, in `[0, 1]`.
///
/// Monotonically non-increasing in `distance` and `visit_count`,
/// non-decreasing in `is_new`. Negative distances count as zero.
pub fn compute_interest(
    kind: TargetKind,
    personality: Personality,
    distance: f64,
    visit_count: u32,
    is_new: bool,
) -> f64 {
    let novelty = if is_new { NOVELTY_BONUS } else { 0.0 };
    let penalty = (f64::from(visit_count) * VISIT_PENALTY_STEP).min(VISIT_PENALTY_CAP);
    let raw = (personality_weight(kind, personality) + novelty - penalty).max(0.0);

    let distance = if distance.is_finite() { distance.max(0.0) } else { f64::MAX };
    let decay = 1.0 / (1.0 + distance / DISTANCE_HALF_LIFE);

    (raw * decay).clamp(0.0, 1.0)
}

/// Pick the most interesting candidate strictly above [`MIN_INTEREST`].
///
/// Visit counts and discovery times are taken from `history`. Ties go to
/// the candidate seen first.
pub fn scan_for_targets(
    position: Vec3,
    personality: Personality,
    history: &[AttentionTarget],
    candidates: &[AttentionCandidate],
    now: DateTime<Utc>,
) -> Option<AttentionTarget> {
    let mut best: Option<AttentionTarget> = None;

    for candidate in candidates {
        let known = history
            .iter()
            .find(|t| t.same_target(candidate.kind, &candidate.id));
        let visit_count = known.map_or(0, |t| t.visit_count);
        let interest = compute_interest(
            candidate.kind,
            personality,
            position.distance(candidate.position),
            visit_count,
            known.is_none(),
        );

        if interest <= MIN_INTEREST || best.as_ref().is_some_and(|b| interest <= b.interest) {
            continue;
        }

        best = Some(AttentionTarget {
            kind: candidate.kind,
            id: candidate.id.clone(),
            label: candidate.label.clone(),
            position: candidate.position,
            interest,
            discovered_at: known.map_or(now, |t| t.discovered_at),
            last_visited_at: known.and_then(|t| t.last_visited_at),
            visit_count,
            domain: candidate.domain.clone(),
            difficulty: candidate.difficulty,
        });
    }

    best
}

/// How long a personality stays with a target of the given interest.
pub const fn boredom_threshold(personality: Personality, interest: f64) -> Duration {
    let secs = match personality {
        Personality::Calm => 60,
        Personality::Neutral => 40,
        Personality::Extrovert => 30,
        Personality::Curious => 25,
        Personality::Chaotic => 15,
    };
    let base = Duration::from_secs(secs);
    if interest < LOW_INTEREST {
        Duration::from_millis(secs.saturating_mul(500))
    } else {
        base
    }
}

/// Whether a cube that has watched `target` for `observed` is done with it.
pub const fn is_bored_of(
    target: &AttentionTarget,
    personality: Personality,
    observed: Duration,
) -> bool {
    let threshold = boredom_threshold(personality, target.interest);
    observed.as_millis() >= threshold.as_millis()
}

/// Record a finished visit, returning the new history.
///
/// An entry for the same target is updated in place (count + 1, visit
/// time, latest interest); otherwise the target is appended with one
/// visit. The input is never mutated.
pub fn record_visit(
    history: &[AttentionTarget],
    target: &AttentionTarget,
    now: DateTime<Utc>,
) -> Vec<AttentionTarget> {
    let mut next = history.to_vec();
    if let Some(entry) = next
        .iter_mut()
        .find(|t| t.same_target(target.kind, &target.id))
    {
        entry.visit_count = entry.visit_count.saturating_add(1);
        entry.last_visited_at = Some(now);
        entry.interest = target.interest;
        entry.position = target.position;
    } else {
        let mut entry = target.clone();
        entry.visit_count = entry.visit_count.saturating_add(1);
        entry.last_visited_at = Some(now);
        next.push(entry);
    }
    next
}

// ---------------------------------------------------------------------------
// Per-cube attention state
// ---------------------------------------------------------------------------

/// Outcome of one [`AttentionState::step`].
///
/// The new focus, if any, is in [`AttentionState::focus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionStep {
    /// Still interested in the current focus.
    Continued,
    /// Picked up a focus while idle.
    Focused,
    /// Got bored of the previous focus and moved to another one.
    Switched,
    /// Got bored of the previous focus and found nothing else worth watching.
    Abandoned,
    /// Nothing in focus and nothing interesting around.
    Idle,
}

/// One cube's current focus and visit history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttentionState {
    /// What the cube is currently looking at.
    pub focus: Option<AttentionTarget>,
    /// When the current focus started.
    pub focus_since: Option<DateTime<Utc>>,
    /// Every target visited so far.
    pub history: Vec<AttentionTarget>,
}

impl AttentionState {
    /// Advance attention: drop a boring focus into the history and rescan.
    ///
    /// The target that was just abandoned is not eligible again in the
    /// same step.
    pub fn step(
        &mut self,
        position: Vec3,
        personality: Personality,
        candidates: &[AttentionCandidate],
        now: DateTime<Utc>,
    ) -> AttentionStep {
        let mut abandoned = None;

        if let Some(focus) = &self.focus {
            let observed = self
                .focus_since
                .and_then(|since| now.signed_duration_since(since).to_std().ok())
                .unwrap_or_default();
            if !is_bored_of(focus, personality, observed) {
                return AttentionStep::Continued;
            }
            trace!(
                target_id = %focus.id,
                observed_ms = observed.as_millis(),
                "attention: bored of target"
            );
            self.history = record_visit(&self.history, focus, now);
            abandoned = self.focus.take();
            self.focus_since = None;
        }

        let eligible: Vec<AttentionCandidate> = candidates
            .iter()
            .filter(|c| {
                abandoned
                    .as_ref()
                    .is_none_or(|a| !a.same_target(c.kind, &c.id))
            })
            .cloned()
            .collect();

        let next = scan_for_targets(position, personality, &self.history, &eligible, now);
        let step = match (&next, abandoned.is_some()) {
            (Some(_), false) => AttentionStep::Focused,
            (Some(_), true) => AttentionStep::Switched,
            (None, true) => AttentionStep::Abandoned,
            (None, false) => AttentionStep::Idle,
        };
        if next.is_some() {
            self.focus_since = Some(now);
        }
        self.focus = next;
        step
    }

    /// One-line description of the current focus for prompts.
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        let Some(focus) = &self.focus else {
            return "Not focused on anything in particular.".to_owned();
        };
        let secs = self
            .focus_since
            .map_or(0, |since| now.signed_duration_since(since).num_seconds().max(0));
        let label = if focus.label.is_empty() {
            focus.id.as_str()
        } else {
            focus.label.as_str()
        };
        format!(
            "Watching the {} \"{}\" for {secs}s (interest {:.2}, visited {} times).",
            focus.kind.as_str(),
            label,
            focus.interest,
            focus.visit_count,
        )
    }
}
