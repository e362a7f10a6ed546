use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Order ingestion (created vs. duplicate)
// - Cache effectiveness (hits, misses, errors by operation)
// - Consumer outcomes per message and persist attempts
// - HTTP read API traffic
//
// Every Metrics value owns its own Registry; nothing is registered with the
// prometheus default registry. The handle is passed to components through
// their constructors and exposed via GET /metrics.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingestion
    pub orders_created: IntCounter,
    pub orders_duplicate: IntCounter,

    // Cache
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_errors: IntCounterVec,

    // Consumer
    pub consumer_messages: IntCounterVec,
    pub consumer_persist_attempts: IntCounter,

    // HTTP
    pub http_requests: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Orders newly persisted")?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_duplicate = IntCounter::new(
            "orders_duplicate_total",
            "Order writes absorbed because the order already existed",
        )?;
        registry.register(Box::new(orders_duplicate.clone()))?;

        let cache_hits = IntCounter::new("cache_hits_total", "Order reads served from cache")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = IntCounter::new(
            "cache_misses_total",
            "Order reads that fell back to the store",
        )?;
        registry.register(Box::new(cache_misses.clone()))?;

        let cache_errors = IntCounterVec::new(
            Opts::new("cache_errors_total", "Cache failures other than misses"),
            &["operation"],
        )?;
        registry.register(Box::new(cache_errors.clone()))?;

        let consumer_messages = IntCounterVec::new(
            Opts::new("consumer_messages_total", "Queue messages by terminal outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(consumer_messages.clone()))?;

        let consumer_persist_attempts = IntCounter::new(
            "consumer_persist_attempts_total",
            "Calls to persist an order, retries included",
        )?;
        registry.register(Box::new(consumer_persist_attempts.clone()))?;

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_duplicate,
            cache_hits,
            cache_misses,
            cache_errors,
            consumer_messages,
            consumer_persist_attempts,
            http_requests,
            http_request_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_cache_error(&self, operation: &str) {
        self.cache_errors.with_label_values(&[operation]).inc();
    }

    pub fn record_message_outcome(&self, outcome: &str) {
        self.consumer_messages.with_label_values(&[outcome]).inc();
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn encode_text(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
