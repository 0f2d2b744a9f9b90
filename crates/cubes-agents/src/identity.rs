//! Identity hint counters.
//!
//! Early prompts remind a cube what it is (a small cube living in a shared
//! world). Once a cube has been reminded often enough the hint is dropped
//! so prompts stay short. The counters are persisted so the reminders do
//! not restart every session.

use std::collections::BTreeMap;
use std::sync::Mutex;

use cubes_types::AgentId;

/// Per-cube count of identity hints already given.
#[derive(Debug, Default)]
pub struct IdentityHints {
    limit: u32,
    counts: Mutex<BTreeMap<AgentId, u32>>,
}

impl IdentityHints {
    /// Counters that allow `limit` hints per cube.
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            counts: Mutex::new(BTreeMap::new()),
        }
    }

    /// Whether the next prompt for `id` should carry the hint.
    pub fn is_due(&self, id: &AgentId) -> bool {
        self.given(id) < self.limit
    }

    /// Count one hint as given to `id`. Returns `false` once the limit is
    /// reached.
    pub fn record(&self, id: &AgentId) -> bool {
        let Ok(mut counts) = self.counts.lock() else {
            return false;
        };
        let count = counts.entry(id.clone()).or_insert(0);
        if *count >= self.limit {
            return false;
        }
        *count = count.saturating_add(1);
        true
    }

    /// Hints given so far to `id`.
    pub fn given(&self, id: &AgentId) -> u32 {
        self.counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(id).copied())
            .unwrap_or(0)
    }

    /// Copy of every counter, for persistence.
    pub fn export(&self) -> BTreeMap<AgentId, u32> {
        self.counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default()
    }

    /// Load persisted counters, keeping the higher of saved and current.
    pub fn restore(&self, saved: BTreeMap<AgentId, u32>) {
        let Ok(mut counts) = self.counts.lock() else {
            return;
        };
        for (id, saved_count) in saved {
            let count = counts.entry(id).or_insert(0);
            *count = (*count).max(saved_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_stop_at_limit() {
        let hints = IdentityHints::new(2);
        let id = AgentId::from("cube-1");
        assert!(hints.is_due(&id));
        assert!(hints.record(&id));
        assert!(hints.record(&id));
        assert!(!hints.is_due(&id));
        assert!(!hints.record(&id));
        assert_eq!(hints.given(&id), 2);
        assert!(hints.is_due(&AgentId::from("cube-2")));
    }

    #[test]
    fn restore_keeps_higher_count() {
        let hints = IdentityHints::new(5);
        let id = AgentId::from("cube-1");
        hints.record(&id);
        hints.restore([(id.clone(), 4)].into_iter().collect());
        assert_eq!(hints.given(&id), 4);
        hints.restore([(id.clone(), 1)].into_iter().collect());
        assert_eq!(hints.given(&id), 4);
        assert_eq!(hints.export().len(), 1);
    }
}
