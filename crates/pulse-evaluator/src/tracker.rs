//! Duration-hold tracking for threshold and multi-condition rules.
//!
//! `duration_minutes` means "the comparison must hold continuously for
//! this long before the alert opens" (`spec.md` §4.3). Evaluation is
//! stateless per tick otherwise, so this is the one piece of in-process
//! memory the rule engine keeps: when a condition's instantaneous check
//! is true, the first tick it was observed true; when false, the entry
//! is dropped and the clock restarts next time it becomes true. Like
//! `pulse_ingest::rate_limit::RateLimiter`'s buckets, this state is
//! acceptable to lose on restart — the duration timer simply restarts,
//! delaying that alert's open by at most one more duration window.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// A field of `EvaluatorContext`, not a process-global singleton.
#[derive(Default)]
pub struct ConditionTracker {
    started_at: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ConditionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key`'s condition holds at `now`, and report whether it
    /// has now held continuously for at least `duration_minutes`.
    pub fn mark_and_check(&self, key: &str, duration_minutes: u32, now: DateTime<Utc>) -> bool {
        let mut started = self.started_at.lock().unwrap();
        let start = *started.entry(key.to_string()).or_insert(now);
        (now - start).num_seconds() >= i64::from(duration_minutes) * 60
    }

    /// Record that `key`'s condition no longer holds, resetting its clock.
    pub fn reset(&self, key: &str) {
        self.started_at.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_fires_on_first_observation() {
        let tracker = ConditionTracker::new();
        let now = Utc::now();
        assert!(tracker.mark_and_check("k", 0, now));
    }

    #[test]
    fn nonzero_duration_waits_for_elapsed_time() {
        let tracker = ConditionTracker::new();
        let t0 = Utc::now();
        assert!(!tracker.mark_and_check("k", 5, t0));
        let t1 = t0 + chrono::Duration::minutes(4);
        assert!(!tracker.mark_and_check("k", 5, t1));
        let t2 = t0 + chrono::Duration::minutes(5);
        assert!(tracker.mark_and_check("k", 5, t2));
    }

    #[test]
    fn reset_restarts_the_clock() {
        let tracker = ConditionTracker::new();
        let t0 = Utc::now();
        tracker.mark_and_check("k", 5, t0);
        tracker.reset("k");
        let t1 = t0 + chrono::Duration::minutes(5);
        assert!(!tracker.mark_and_check("k", 5, t1));
    }

    #[test]
    fn keys_are_independent() {
        let tracker = ConditionTracker::new();
        let now = Utc::now();
        assert!(tracker.mark_and_check("a", 0, now));
        assert!(!tracker.mark_and_check("b", 5, now));
    }
}
