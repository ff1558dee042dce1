//! Commit ordering queue
//!
//! Commits and cancels take a ticket when they are submitted and run one at
//! a time in ticket order. Commit times therefore follow submission order
//! even though each commit runs on its own task.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct CommitQueue {
    next_ticket: AtomicU64,
    serving: watch::Sender<u64>,
}

impl CommitQueue {
    pub fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            next_ticket: AtomicU64::new(0),
            serving,
        }
    }

    /// Every ticket must reach `turn`, or all later tickets wait forever.
    /// Hand it to a spawned task straight away.
    pub fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::SeqCst)
    }

    /// Wait until `ticket` is served. The turn ends when the guard drops.
    pub async fn turn(&self, ticket: u64) -> Turn<'_> {
        let mut serving = self.serving.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = serving.wait_for(|current| *current >= ticket).await;
        Turn { queue: self }
    }
}

pub(crate) struct Turn<'a> {
    queue: &'a CommitQueue,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.queue.serving.send_modify(|current| *current += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_turns_follow_ticket_order() {
        let queue = Arc::new(CommitQueue::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let tickets: Vec<u64> = (0..16).map(|_| queue.ticket()).collect();
        let mut handles = Vec::new();
        for ticket in tickets.into_iter().rev() {
            let queue = Arc::clone(&queue);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _turn = queue.turn(ticket).await;
                order.lock().unwrap().push(ticket);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }
}
