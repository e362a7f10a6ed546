use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{MessageSource, QueueMessage};
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::service::OrderService;
use crate::utils::{retry_with_backoff, RetryConfig, RetryResult};

// ============================================================================
// Ingest Consumer - Queue to Store
// ============================================================================
//
// One message at a time:
//
// 1. FETCH: wait for the next message or for cancellation. A fetch error is
//    logged and followed by a short, interruptible pause.
// 2. DECODE: JSON to Order. Undecodable payloads are terminal.
// 3. VALIDATE: rule violations are terminal.
// 4. PERSIST: create_order with exponential backoff. Exhausting the attempts
//    is terminal; cancellation during an attempt or its backoff is not.
// 5. COMMIT: every terminal outcome commits the read position, so a poison
//    message never blocks its partition. A cancelled message is left
//    uncommitted and will be redelivered.
//
// Duplicates from redelivery are absorbed by the idempotent store write.
//
// ============================================================================

/// How processing of a single message ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Persisted,
    Malformed,
    Invalid,
    RetriesExhausted,
    Cancelled,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Persisted => "persisted",
            MessageOutcome::Malformed => "malformed",
            MessageOutcome::Invalid => "invalid",
            MessageOutcome::RetriesExhausted => "retries_exhausted",
            MessageOutcome::Cancelled => "cancelled",
        }
    }

    /// Whether the read position moves past this message
    pub fn commits(&self) -> bool {
        !matches!(self, MessageOutcome::Cancelled)
    }
}

#[derive(Clone, Debug)]
pub struct ConsumerSettings {
    pub retry: RetryConfig,
    pub fetch_error_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            fetch_error_backoff: Duration::from_secs(1),
        }
    }
}

pub struct IngestConsumer {
    source: Arc<dyn MessageSource>,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
    settings: ConsumerSettings,
}

impl IngestConsumer {
    pub fn new(
        source: Arc<dyn MessageSource>,
        service: Arc<OrderService>,
        metrics: Arc<Metrics>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            source,
            service,
            metrics,
            settings,
        }
    }

    /// Run until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("Ingest consumer started");

        loop {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                fetched = self.source.fetch() => fetched,
            };

            let message = match fetched {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backoff_ms = self.settings.fetch_error_backoff.as_millis(),
                        "Failed to fetch message"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.fetch_error_backoff) => continue,
                    }
                }
            };

            let outcome = self.process(&message, &cancel).await;
            self.metrics.record_message_outcome(outcome.as_str());

            if !outcome.commits() {
                tracing::info!(
                    key = %message.key_str(),
                    offset = message.offset,
                    "Message left uncommitted on shutdown"
                );
                break;
            }

            if let Err(e) = self.source.commit(&message).await {
                tracing::error!(
                    error = %e,
                    partition = message.partition,
                    offset = message.offset,
                    "Failed to commit offset"
                );
            }
        }

        tracing::info!("Ingest consumer stopped");
        Ok(())
    }

    /// Decode, validate and persist one message
    pub async fn process(&self, message: &QueueMessage, cancel: &CancellationToken) -> MessageOutcome {
        tracing::debug!(
            key = %message.key_str(),
            partition = message.partition,
            offset = message.offset,
            "Received message"
        );

        let order = match Order::from_json(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    key = %message.key_str(),
                    offset = message.offset,
                    error = %e,
                    "Dropping undecodable message"
                );
                return MessageOutcome::Malformed;
            }
        };

        if let Err(e) = order.validate() {
            tracing::warn!(
                order_uid = %order.order_uid,
                offset = message.offset,
                error = %e,
                "Dropping invalid order"
            );
            return MessageOutcome::Invalid;
        }

        let service = self.service.clone();
        let metrics = self.metrics.clone();
        let order = Arc::new(order);

        let result = retry_with_backoff(&self.settings.retry, cancel, |attempt| {
            let service = service.clone();
            let metrics = metrics.clone();
            let order = order.clone();

            async move {
                metrics.consumer_persist_attempts.inc();
                tracing::debug!(
                    attempt = attempt,
                    order_uid = %order.order_uid,
                    "Persisting order"
                );
                service.create_order(&order).await
            }
        })
        .await;

        match result {
            RetryResult::Success(_) => MessageOutcome::Persisted,
            RetryResult::Failed(e) => {
                tracing::error!(
                    order_uid = %order.order_uid,
                    attempts = self.settings.retry.max_attempts,
                    error = %e,
                    "Giving up on order after retries"
                );
                MessageOutcome::RetriesExhausted
            }
            RetryResult::Cancelled => MessageOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::order::sample_order;
    use crate::messaging::MemorySource;
    use crate::service::ServiceSettings;
    use crate::store::{MemoryOrderStore, OrderStore, StoreError, WriteOutcome};

    struct Fixture {
        source: Arc<MemorySource>,
        store: Arc<MemoryOrderStore>,
        metrics: Arc<Metrics>,
        consumer: Arc<IngestConsumer>,
    }

    fn fixture(retry: RetryConfig) -> Fixture {
        let source = Arc::new(MemorySource::new());
        let store = Arc::new(MemoryOrderStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = Arc::new(OrderService::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            metrics.clone(),
            ServiceSettings::default(),
        ));
        let consumer = Arc::new(IngestConsumer::new(
            source.clone(),
            service,
            metrics.clone(),
            ConsumerSettings {
                retry,
                fetch_error_backoff: Duration::from_millis(10),
            },
        ));
        Fixture {
            source,
            store,
            metrics,
            consumer,
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
        }
    }

    fn payload(order_uid: &str) -> Vec<u8> {
        serde_json::to_vec(&sample_order(order_uid)).unwrap()
    }

    /// Poll until `cond` holds, for at most two seconds of wall time
    async fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_valid_message_is_persisted() {
        let f = fixture(fast_retry(3));
        f.source.push("A1", payload("A1"));
        let message = f.source.fetch().await.unwrap();

        let outcome = f.consumer.process(&message, &CancellationToken::new()).await;

        assert_eq!(outcome, MessageOutcome::Persisted);
        assert!(f.store.contains("A1"));
    }

    #[tokio::test]
    async fn test_malformed_payload_never_reaches_store() {
        let f = fixture(fast_retry(3));
        f.source.push("bad", "{not json");
        let message = f.source.fetch().await.unwrap();

        let outcome = f.consumer.process(&message, &CancellationToken::new()).await;

        assert_eq!(outcome, MessageOutcome::Malformed);
        assert_eq!(f.store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_order_never_reaches_store() {
        let f = fixture(fast_retry(3));
        let mut order = sample_order("neg");
        order.payment.amount = -1;
        f.source.push("neg", serde_json::to_vec(&order).unwrap());
        let message = f.source.fetch().await.unwrap();

        let outcome = f.consumer.process(&message, &CancellationToken::new()).await;

        assert_eq!(outcome, MessageOutcome::Invalid);
        assert_eq!(f.store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let f = fixture(fast_retry(5));
        f.store.fail_next_writes(2);
        f.source.push("A1", payload("A1"));
        let message = f.source.fetch().await.unwrap();

        let outcome = f.consumer.process(&message, &CancellationToken::new()).await;

        assert_eq!(outcome, MessageOutcome::Persisted);
        assert_eq!(f.store.write_calls(), 3);
        assert_eq!(f.metrics.consumer_persist_attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_and_backoff_spacing() {
        let f = fixture(RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
        });
        f.store.fail_writes(true);
        f.source.push("A1", payload("A1"));
        let message = f.source.fetch().await.unwrap();

        let outcome = f.consumer.process(&message, &CancellationToken::new()).await;

        assert_eq!(outcome, MessageOutcome::RetriesExhausted);
        assert_eq!(f.store.write_calls(), 5);

        let instants = f.store.write_instants();
        let gaps: Vec<u64> = instants
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 4, 4]);
    }

    #[tokio::test]
    async fn test_run_commits_terminal_outcomes_and_keeps_going() {
        let f = fixture(fast_retry(2));
        f.source.push("bad", "garbage");
        f.source.push("A1", payload("A1"));
        f.source.push("A1", payload("A1"));

        let cancel = CancellationToken::new();
        let consumer = f.consumer.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });

        let source = f.source.clone();
        wait_until(move || source.committed_offsets().len() == 3).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(f.source.committed_offsets(), vec![0, 1, 2]);
        assert_eq!(f.store.order_count(), 1);
        assert_eq!(
            f.metrics.consumer_messages.with_label_values(&["malformed"]).get(),
            1
        );
        assert_eq!(
            f.metrics.consumer_messages.with_label_values(&["persisted"]).get(),
            2
        );
    }

    #[tokio::test]
    async fn test_exhausted_message_is_committed() {
        let f = fixture(fast_retry(3));
        f.store.fail_writes(true);
        f.source.push("A1", payload("A1"));

        let cancel = CancellationToken::new();
        let consumer = f.consumer.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });

        let source = f.source.clone();
        wait_until(move || source.committed_offsets() == vec![0]).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(f.store.write_calls(), 3);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_exits_without_commit() {
        let f = fixture(RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        });
        f.store.fail_writes(true);
        f.source.push("A1", payload("A1"));

        let cancel = CancellationToken::new();
        let consumer = f.consumer.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });

        let store = f.store.clone();
        wait_until(move || store.write_calls() == 1).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(f.source.committed_offsets().is_empty());
        assert_eq!(f.store.write_calls(), 1);
        assert_eq!(
            f.metrics.consumer_messages.with_label_values(&["cancelled"]).get(),
            1
        );
    }

    /// Store whose writes never complete, like a stalled database connection
    struct StalledStore {
        writes: std::sync::atomic::AtomicU32,
    }

    #[async_trait::async_trait]
    impl OrderStore for StalledStore {
        async fn write_order(&self, _order: &Order) -> Result<WriteOutcome, StoreError> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            std::future::pending().await
        }

        async fn read_order(&self, order_uid: &str) -> Result<Order, StoreError> {
            Err(StoreError::NotFound(order_uid.to_string()))
        }
    }

    #[tokio::test]
    async fn test_cancel_during_stalled_write_exits_without_commit() {
        let source = Arc::new(MemorySource::new());
        let store = Arc::new(StalledStore {
            writes: std::sync::atomic::AtomicU32::new(0),
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = Arc::new(OrderService::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            metrics.clone(),
            ServiceSettings::default(),
        ));
        let consumer = IngestConsumer::new(
            source.clone(),
            service,
            metrics.clone(),
            ConsumerSettings {
                retry: fast_retry(3),
                fetch_error_backoff: Duration::from_millis(10),
            },
        );
        source.push("A1", payload("A1"));

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });

        let writes = store.clone();
        wait_until(move || writes.writes.load(std::sync::atomic::Ordering::SeqCst) == 1).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(source.committed_offsets().is_empty());
        assert_eq!(
            metrics.consumer_messages.with_label_values(&["cancelled"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_fetch_and_commit_errors_do_not_stop_the_loop() {
        let f = fixture(fast_retry(2));
        f.source.fail_next_fetches(2);
        f.source.fail_next_commits(1);
        f.source.push("A1", payload("A1"));
        f.source.push("A2", payload("A2"));

        let cancel = CancellationToken::new();
        let consumer = f.consumer.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });

        let store = f.store.clone();
        let source = f.source.clone();
        wait_until(move || store.order_count() == 2 && source.committed_offsets() == vec![1]).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert!(f.source.fetch_calls() >= 4);
    }

    #[tokio::test]
    async fn test_idle_consumer_stops_on_cancel() {
        let f = fixture(fast_retry(2));
        let cancel = CancellationToken::new();
        let consumer = f.consumer.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
