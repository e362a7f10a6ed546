use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use super::{MessageSource, QueueMessage, SourceError};

// ============================================================================
// In-Memory Source
// ============================================================================
//
// A single-partition queue for driving the consumer loop in tests. `fetch`
// waits until something is pushed; commits are recorded for inspection.
//
// ============================================================================

#[derive(Default)]
pub struct MemorySource {
    queue: Mutex<VecDeque<QueueMessage>>,
    committed: Mutex<Vec<QueueMessage>>,
    notify: Notify,
    next_offset: Mutex<i64>,
    failing_fetches_left: AtomicU32,
    failing_commits_left: AtomicU32,
    fetch_calls: AtomicU32,
}

impl MemorySource {
    pub const TOPIC: &'static str = "orders";

    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a payload keyed by `key`; returns its offset
    pub fn push(&self, key: &str, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = {
            let mut next = self
                .next_offset
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let offset = *next;
            *next += 1;
            offset
        };

        let message = QueueMessage {
            key: Some(key.as_bytes().to_vec()),
            payload: payload.into(),
            topic: Self::TOPIC.to_string(),
            partition: 0,
            offset,
        };
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(message);
        self.notify.notify_one();

        offset
    }

    pub fn fail_next_fetches(&self, count: u32) {
        self.failing_fetches_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits_left.store(count, Ordering::SeqCst);
    }

    /// Offsets committed so far, in commit order
    pub fn committed_offsets(&self) -> Vec<i64> {
        self.committed
            .lock()
            .map(|committed| committed.iter().map(|m| m.offset).collect())
            .unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn pop(&self) -> Option<QueueMessage> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn fetch(&self) -> Result<QueueMessage, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.failing_fetches_left) {
            return Err(SourceError::Fetch("injected fetch failure".into()));
        }

        loop {
            let notified = self.notify.notified();
            if let Some(message) = self.pop() {
                return Ok(message);
            }
            notified.await;
        }
    }

    async fn commit(&self, message: &QueueMessage) -> Result<(), SourceError> {
        if Self::take_failure(&self.failing_commits_left) {
            return Err(SourceError::Commit("injected commit failure".into()));
        }

        self.committed
            .lock()
            .map_err(|_| SourceError::Commit("memory source lock poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}
