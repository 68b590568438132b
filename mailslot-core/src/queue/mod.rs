//! Bounded long-poll message queue
//!
//! Producers call [`MessageQueue::enqueue`], which never blocks: when the
//! queue is full the oldest entry is dropped. Consumers call
//! [`MessageQueue::poll`], which returns immediately when qualifying entries
//! are queued and otherwise waits for the next enqueue, the timeout, or
//! cancellation, whichever comes first. Every entry is handed to at most one
//! poller.

pub mod entry;
mod ring;

pub use entry::Entry;

use parking_lot::Mutex;
use ring::Ring;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Capacity used when none (or zero) is requested
pub const DEFAULT_CAPACITY: usize = 1000;

/// Construction options for [`MessageQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Maximum number of queued entries; `0` selects [`DEFAULT_CAPACITY`]
    pub capacity: usize,
}

impl QueueOptions {
    /// Options with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    fn effective_capacity(&self) -> usize {
        if self.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

struct State {
    ring: Ring,
    /// Bumped once per enqueue.
    generation: u64,
}

/// Thread-safe bounded FIFO with long-poll support
pub struct MessageQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl MessageQueue {
    /// Create a queue from options
    pub fn new(options: QueueOptions) -> Self {
        let capacity = options.effective_capacity();
        debug!(capacity, "Creating message queue");
        Self {
            state: Mutex::new(State {
                ring: Ring::with_capacity(capacity),
                generation: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Create a queue holding at most `capacity` entries (`0` selects the default)
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(QueueOptions::with_capacity(capacity))
    }

    /// Maximum number of entries the queue holds
    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    /// Append `entry` as the newest item and wake every pending poller.
    ///
    /// Drops the oldest entry first when the queue is full.
    pub fn enqueue(&self, entry: Entry) {
        let generation = {
            let mut state = self.state.lock();
            if let Some(evicted) = state.ring.push(entry) {
                debug!(id = %evicted.id, channel = %evicted.channel_id, "Queue full, dropped oldest entry");
            }
            state.generation = state.generation.wrapping_add(1);
            state.generation
        };
        trace!(generation, "Entry enqueued");
        // Waiters registered their interest under the lock above.
        self.notify.notify_waiters();
    }

    /// Take up to `limit` entries matching `channel`, waiting up to `timeout`.
    ///
    /// `limit == 0` returns every qualifying entry. An empty `channel`
    /// accepts all entries; otherwise an entry qualifies when its channel id
    /// or channel name equals `channel`, and non-matching entries stay queued
    /// in their original order.
    ///
    /// Returns an empty vector on timeout or cancellation. A token that is
    /// already cancelled takes nothing from the queue.
    pub async fn poll(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
        limit: usize,
        channel: &str,
    ) -> Vec<Entry> {
        if cancel.is_cancelled() {
            return Vec::new();
        }

        let deadline = deadline_after(timeout);
        loop {
            let notified = {
                let mut state = self.state.lock();
                let batch = state.ring.drain(limit, channel);
                if !batch.is_empty() {
                    debug!(count = batch.len(), channel, "Drained entries");
                    return batch;
                }
                // Created while the lock is held so an enqueue that lands
                // between unlock and the await below still wakes us.
                self.notify.notified()
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!("Poll cancelled");
                    return Vec::new();
                }
                _ = tokio::time::sleep_until(deadline) => {
                    trace!("Poll timed out");
                    return Vec::new();
                }
                _ = notified => {}
            }
        }
    }

    /// Take whatever currently qualifies without waiting
    pub fn try_poll(&self, limit: usize, channel: &str) -> Vec<Entry> {
        self.state.lock().ring.drain(limit, channel)
    }

    /// Number of queued entries (advisory)
    pub fn len(&self) -> usize {
        self.state.lock().ring.len()
    }

    /// Whether the queue is currently empty (advisory)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of enqueues so far
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(channel: &str, content: &str) -> Entry {
        Entry::new(channel, "u1", content).with_channel_name(channel)
    }

    fn contents(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.content.as_str()).collect()
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        assert_eq!(MessageQueue::with_capacity(0).capacity(), DEFAULT_CAPACITY);
        assert_eq!(MessageQueue::default().capacity(), DEFAULT_CAPACITY);
        assert_eq!(MessageQueue::with_capacity(7).capacity(), 7);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MessageQueue::with_capacity(16);
        for i in 0..10 {
            queue.enqueue(entry("a", &i.to_string()));
        }
        let cancel = CancellationToken::new();
        let got = queue.poll(&cancel, Duration::from_secs(1), 10, "").await;
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(contents(&got), expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_keeps_newest() {
        let queue = MessageQueue::with_capacity(3);
        for c in ["a", "b", "c", "d"] {
            queue.enqueue(entry("x", c));
        }
        assert_eq!(queue.len(), 3);

        let cancel = CancellationToken::new();
        let got = queue.poll(&cancel, Duration::from_secs(1), 10, "").await;
        assert_eq!(contents(&got), vec!["b", "c", "d"]);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn test_filter_leaves_other_channels() {
        let queue = MessageQueue::with_capacity(10);
        queue.enqueue(entry("a", "a1"));
        queue.enqueue(entry("b", "b1"));
        queue.enqueue(entry("a", "a2"));

        let cancel = CancellationToken::new();
        let got = queue.poll(&cancel, Duration::from_secs(1), 10, "a").await;
        assert_eq!(contents(&got), vec!["a1", "a2"]);
        assert_eq!(queue.len(), 1);

        let rest = queue.poll(&cancel, Duration::from_secs(1), 0, "").await;
        assert_eq!(contents(&rest), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_limit_caps_result() {
        let queue = MessageQueue::with_capacity(10);
        for c in ["1", "2", "3"] {
            queue.enqueue(entry("a", c));
        }
        assert_eq!(queue.try_poll(2, "").len(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_empty() {
        let queue = MessageQueue::with_capacity(4);
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let got = queue.poll(&cancel, Duration::from_secs(5), 0, "").await;
        assert!(got.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancelled_token_returns_immediately() {
        let queue = MessageQueue::with_capacity(4);
        queue.enqueue(entry("a", "kept"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = std::time::Instant::now();
        let got = queue.poll(&cancel, Duration::from_secs(60), 0, "").await;
        assert!(got.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_wakes_waiter() {
        let queue = Arc::new(MessageQueue::with_capacity(4));
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.poll(&cancel, Duration::from_secs(30), 0, "").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(entry("a", "hello"));

        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("poll should wake on enqueue")
            .unwrap();
        assert_eq!(contents(&got), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_non_matching_enqueue_keeps_waiting() {
        let queue = Arc::new(MessageQueue::with_capacity(4));
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.poll(&cancel, Duration::from_secs(30), 0, "a").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(entry("b", "other"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.enqueue(entry("a", "mine"));
        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("poll should wake on matching enqueue")
            .unwrap();
        assert_eq!(contents(&got), vec!["mine"]);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let queue = Arc::new(MessageQueue::with_capacity(4));
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.poll(&cancel, Duration::from_secs(300), 0, "").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("poll should return on cancel")
            .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn test_generation_counts_enqueues() {
        let queue = MessageQueue::with_capacity(2);
        assert_eq!(queue.generation(), 0);
        for c in ["a", "b", "c"] {
            queue.enqueue(entry("x", c));
        }
        assert_eq!(queue.generation(), 3);
        assert_eq!(queue.len(), 2);
    }
}
