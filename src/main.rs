use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use order_pipeline::api;
use order_pipeline::cache::RedisCache;
use order_pipeline::messaging::{IngestConsumer, KafkaSource};
use order_pipeline::store::PgOrderStore;
use order_pipeline::{telemetry, Config, Metrics, OrderService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(&config.environment);

    tracing::info!(environment = %config.environment, "Starting order pipeline");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 2. Store and cache ===
    tracing::info!("Connecting to PostgreSQL...");
    let store = Arc::new(PgOrderStore::connect(&config.postgres).await?);

    tracing::info!("Connecting to Redis...");
    let cache = Arc::new(RedisCache::connect(&config.redis_url).await?);

    let service = Arc::new(OrderService::new(
        store.clone(),
        cache,
        metrics.clone(),
        config.service.clone(),
    ));

    // === 3. Ingest consumer ===
    let source = Arc::new(KafkaSource::new(&config.kafka)?);
    let consumer = IngestConsumer::new(
        source,
        service.clone(),
        metrics.clone(),
        config.consumer.clone(),
    );

    // === 4. HTTP API ===
    // Bound before the consumer starts so a bind failure leaves nothing running
    let server = api::start_http_server(config.http_addr, service, metrics)?;
    let handle = server.handle();

    let cancel = CancellationToken::new();
    let consumer_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.run(cancel).await })
    };

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, stopping");
            cancel.cancel();
            handle.stop(true).await;
        }
    });

    tracing::info!(addr = %config.http_addr, "Server is running");
    server.await?;

    // The server can also stop on its own; make sure the consumer follows
    cancel.cancel();
    match consumer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Consumer exited with error"),
        Err(e) => tracing::error!(error = %e, "Consumer task panicked"),
    }

    store.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
