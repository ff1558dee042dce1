//! In-flight task accounting
//!
//! Write and commit tasks hold a guard for as long as they run. `sync`
//! waits for the count to reach zero.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Counter {
    running: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    counter: Arc<Counter>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> InFlightGuard {
        self.counter.running.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            counter: Arc::clone(&self.counter),
        }
    }

    pub fn running(&self) -> usize {
        self.counter.running.load(Ordering::SeqCst)
    }

    /// Wait until no guard is alive.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.counter.idle.notified();
            if self.running() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Marks one running task.
#[derive(Debug)]
pub struct InFlightGuard {
    counter: Arc<Counter>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.counter.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_when_nothing_runs() {
        InFlight::new().wait_idle().await;
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_guards() {
        let tracker = InFlight::new();
        let guard = tracker.enter();
        assert_eq!(tracker.running(), 1);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracker.running(), 0);
    }
}
