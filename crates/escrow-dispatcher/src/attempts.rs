//! In-process retry-count tracking for §4.5's "retry count is bounded
//! (e.g., 5)" rule.
//!
//! The persisted model carries `NextAction.errorType/errorNote` but no
//! attempt counter (§3) — the count only needs to survive one process's
//! worth of retries before the entity either succeeds or is promoted to
//! `WaitingForManualAction`, so it lives here rather than as a new
//! migrated column. A process restart resets counts to zero, which is
//! conservative: it can only grant a few extra retries, never fewer than
//! the bound.

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct AttemptTracker {
    counts: Mutex<HashMap<Uuid, u32>>,
}

impl AttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments and returns the new failure count for `id`.
    pub fn record_failure(&self, id: Uuid) -> u32 {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts.entry(id).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn clear(&self, id: Uuid) {
        self.counts.lock().unwrap().remove(&id);
    }

    #[cfg(test)]
    pub fn count(&self, id: Uuid) -> u32 {
        self.counts.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_failure_increments_per_entity_independently() {
        let tracker = AttemptTracker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(tracker.record_failure(a), 1);
        assert_eq!(tracker.record_failure(a), 2);
        assert_eq!(tracker.record_failure(b), 1);
        assert_eq!(tracker.count(a), 2);
    }

    #[test]
    fn clear_resets_to_zero() {
        let tracker = AttemptTracker::new();
        let id = Uuid::new_v4();
        tracker.record_failure(id);
        tracker.clear(id);
        assert_eq!(tracker.count(id), 0);
    }
}
