use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::domain::order::Order;
use crate::utils::{retry_with_backoff, RetryConfig, RetryResult};

/// Publishes orders keyed by order id, so every copy of an order lands on
/// the same partition.
pub struct OrderProducer {
    producer: FutureProducer,
    topic: String,
    retry: RetryConfig,
}

impl OrderProducer {
    pub fn new(brokers: &str, topic: &str) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            retry: RetryConfig {
                max_attempts: 5,
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(2),
                multiplier: 2.0,
            },
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, key: &str, payload: &[u8]) -> anyhow::Result<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        self.producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))?;

        tracing::info!(topic = %self.topic, key = %key, "Published to Kafka");
        Ok(())
    }

    /// Serialize and publish with bounded retry
    pub async fn publish_order(&self, order: &Order) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(order)?;
        let payload = bytes.as_slice();
        let key = order.order_uid.as_str();
        let never = CancellationToken::new();

        let result = retry_with_backoff(&self.retry, &never, move |_attempt| {
            self.publish(key, payload)
        })
        .await;

        match result {
            RetryResult::Success(()) => Ok(()),
            RetryResult::Failed(e) => {
                tracing::error!(
                    error = %e,
                    order_uid = %order.order_uid,
                    "Failed to publish order"
                );
                Err(e)
            }
            RetryResult::Cancelled => Err(anyhow::anyhow!("publish cancelled")),
        }
    }
}
