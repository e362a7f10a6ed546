use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;

use super::{MessageSource, QueueMessage, SourceError};

// ============================================================================
// Kafka Source
// ============================================================================
//
// One StreamConsumer subscribed to a single topic inside a consumer group.
// Partition assignment and rebalancing are left to the group protocol.
//
// Auto-commit is off: the read position only moves when the consumer loop
// commits a message after reaching a terminal outcome for it.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct KafkaSettings {
    pub brokers: String,
    pub group_id: String,
    pub topic: String,
}

/// Client configuration for the ingest consumer
pub fn client_config(settings: &KafkaSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &settings.brokers)
        .set("group.id", &settings.group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("session.timeout.ms", "10000");
    config
}

pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
}

impl KafkaSource {
    pub fn new(settings: &KafkaSettings) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = client_config(settings)
            .create()
            .map_err(|e| SourceError::Fetch(e.into()))?;

        consumer
            .subscribe(&[settings.topic.as_str()])
            .map_err(|e| SourceError::Fetch(e.into()))?;

        tracing::info!(
            brokers = %settings.brokers,
            group_id = %settings.group_id,
            topic = %settings.topic,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn fetch(&self) -> Result<QueueMessage, SourceError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| SourceError::Fetch(e.into()))?
            .detach();

        Ok(QueueMessage {
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        })
    }

    async fn commit(&self, message: &QueueMessage) -> Result<(), SourceError> {
        let mut positions = TopicPartitionList::new();
        positions
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(|e| SourceError::Commit(e.into()))?;

        // A synchronous commit blocks on the broker round trip
        let consumer = self.consumer.clone();
        tokio::task::spawn_blocking(move || consumer.commit(&positions, CommitMode::Sync))
            .await
            .map_err(|e| SourceError::Commit(e.into()))?
            .map_err(|e| SourceError::Commit(e.into()))?;

        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Committed offset"
        );
        Ok(())
    }
}
