//! Commit clock - the single source of commit times
//!
//! - Commit times are epoch milliseconds
//! - Every time handed out is strictly greater than every earlier one, even
//!   when the wall clock stalls or steps backwards
//! - Times seen during changeset replay raise the floor, so local commits
//!   always sort after replayed ones

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

#[derive(Debug, Default)]
pub struct CommitClock {
    /// Highest commit time handed out or observed. Zero before the first.
    last: Mutex<i64>,
}

impl CommitClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock that will only hand out times after `time`.
    pub fn from_observed(time: i64) -> Self {
        Self {
            last: Mutex::new(time),
        }
    }

    fn lock(&self) -> MutexGuard<'_, i64> {
        self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Next commit time: the wall clock, or one past the last time if the
    /// wall clock has not moved past it.
    pub fn next_commit_time(&self) -> i64 {
        let mut last = self.lock();
        let next = Utc::now().timestamp_millis().max(*last + 1);
        *last = next;
        next
    }

    /// Raise the floor to `time`. Returns true if the floor moved.
    pub fn observe(&self, time: i64) -> bool {
        let mut last = self.lock();
        if time > *last {
            *last = time;
            true
        } else {
            false
        }
    }

    pub fn last_commit_time(&self) -> Option<i64> {
        let last = *self.lock();
        (last > 0).then_some(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_new_clock_has_no_commit() {
        assert!(CommitClock::new().last_commit_time().is_none());
    }

    #[test]
    fn test_times_strictly_increase() {
        let clock = CommitClock::new();
        let mut previous = clock.next_commit_time();
        for _ in 0..1000 {
            let next = clock.next_commit_time();
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(clock.last_commit_time(), Some(previous));
    }

    #[test]
    fn test_future_floor_wins_over_wall_clock() {
        let far_future = Utc::now().timestamp_millis() + 3_600_000;
        let clock = CommitClock::from_observed(far_future);
        assert_eq!(clock.next_commit_time(), far_future + 1);
        assert_eq!(clock.next_commit_time(), far_future + 2);
    }

    #[test]
    fn test_observe_only_raises() {
        let clock = CommitClock::from_observed(100);
        assert!(clock.observe(200));
        assert!(!clock.observe(150));
        assert!(!clock.observe(200));
        assert_eq!(clock.last_commit_time(), Some(200));
    }

    #[test]
    fn test_concurrent_callers_never_share_a_time() {
        let clock = Arc::new(CommitClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..500).map(|_| clock.next_commit_time()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for time in handle.join().unwrap() {
                assert!(seen.insert(time), "duplicate commit time {}", time);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
