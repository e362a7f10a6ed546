// ============================================================================
// Messaging - Queue Source, Ingestion Consumer, Producer
// ============================================================================
//
// The consumer never talks to Kafka directly; it pulls through the
// MessageSource trait so the fetch/commit loop can be driven by an
// in-process queue in tests.
//
// ============================================================================

pub mod consumer;
pub mod kafka;
pub mod memory;
pub mod producer;

use async_trait::async_trait;

pub use consumer::{ConsumerSettings, IngestConsumer, MessageOutcome};
pub use kafka::{KafkaSettings, KafkaSource};
pub use memory::MemorySource;
pub use producer::OrderProducer;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fetched queue record, detached from the client that produced it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl QueueMessage {
    /// Key as text, for logging
    pub fn key_str(&self) -> &str {
        self.key
            .as_deref()
            .and_then(|k| std::str::from_utf8(k).ok())
            .unwrap_or("")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] BoxError),

    #[error("commit failed: {0}")]
    Commit(#[source] BoxError),
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next message. Cancel-safe: dropping the future loses
    /// nothing that has not been handed out.
    async fn fetch(&self) -> Result<QueueMessage, SourceError>;

    /// Mark `message` and everything before it on its partition as consumed
    async fn commit(&self, message: &QueueMessage) -> Result<(), SourceError>;
}
