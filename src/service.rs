use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, Cache, CacheError};
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreError, WriteOutcome};

// ============================================================================
// Order Service - Store and Cache Coordination
// ============================================================================
//
// Write path: the store write decides success. The cache is populated
// afterwards on a best-effort basis; its failures are logged and counted but
// never returned.
//
// Read path (cache-aside): try the cache under a short timeout, fall back to
// the store on anything but a hit, then repopulate the cache.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub cache_ttl: Duration,
    pub cache_read_timeout: Duration,
    pub cache_write_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_read_timeout: Duration::from_millis(200),
            cache_write_timeout: Duration::from_secs(1),
        }
    }
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn Cache>,
    metrics: Arc<Metrics>,
    settings: ServiceSettings,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn Cache>,
        metrics: Arc<Metrics>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            settings,
        }
    }

    /// Persist the order, then cache it.
    ///
    /// A duplicate order id is a success. Only store errors are returned.
    #[tracing::instrument(
        name = "service.create_order",
        skip_all,
        fields(order_uid = %order.order_uid),
        err
    )]
    pub async fn create_order(&self, order: &Order) -> Result<WriteOutcome, ServiceError> {
        let outcome = self.store.write_order(order).await?;

        match outcome {
            WriteOutcome::Inserted => {
                self.metrics.orders_created.inc();
                tracing::info!(order_uid = %order.order_uid, "Order persisted");
            }
            WriteOutcome::AlreadyExists => {
                self.metrics.orders_duplicate.inc();
                tracing::info!(order_uid = %order.order_uid, "Order already persisted, write skipped");
            }
        }

        self.populate_cache(order).await;

        Ok(outcome)
    }

    /// Fetch an order, cache first.
    #[tracing::instrument(name = "service.get_order", skip_all, fields(order_uid = %order_uid))]
    pub async fn get_order(&self, order_uid: &str) -> Result<Order, ServiceError> {
        match self.read_cache(order_uid).await {
            Some(order) => {
                self.metrics.cache_hits.inc();
                tracing::debug!(order_uid = %order_uid, "Cache hit");
                return Ok(order);
            }
            None => self.metrics.cache_misses.inc(),
        }

        let order = match self.store.read_order(order_uid).await {
            Ok(order) => order,
            Err(StoreError::NotFound(id)) => return Err(ServiceError::NotFound(id)),
            Err(e) => {
                tracing::error!(order_uid = %order_uid, error = %e, "Store read failed");
                return Err(e.into());
            }
        };

        self.populate_cache(&order).await;

        Ok(order)
    }

    /// Cached copy of the order, if one could be read in time
    async fn read_cache(&self, order_uid: &str) -> Option<Order> {
        let read = cache::get_json::<Order>(self.cache.as_ref(), order_uid);

        match tokio::time::timeout(self.settings.cache_read_timeout, read).await {
            Ok(Ok(order)) => Some(order),
            Ok(Err(CacheError::Miss)) => None,
            Ok(Err(e)) => {
                self.metrics.record_cache_error("get");
                tracing::warn!(order_uid = %order_uid, error = %e, "Cache read failed, falling back to store");
                None
            }
            Err(_) => {
                self.metrics.record_cache_error("get");
                tracing::warn!(
                    order_uid = %order_uid,
                    timeout_ms = self.settings.cache_read_timeout.as_millis(),
                    "Cache read timed out, falling back to store"
                );
                None
            }
        }
    }

    async fn populate_cache(&self, order: &Order) {
        let write = cache::put_json(
            self.cache.as_ref(),
            &order.order_uid,
            order,
            self.settings.cache_ttl,
        );

        match tokio::time::timeout(self.settings.cache_write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.metrics.record_cache_error("set");
                tracing::warn!(order_uid = %order.order_uid, error = %e, "Cache write failed");
            }
            Err(_) => {
                self.metrics.record_cache_error("set");
                tracing::warn!(order_uid = %order.order_uid, "Cache write timed out");
            }
        }
    }
}
