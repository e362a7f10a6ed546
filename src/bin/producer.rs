use anyhow::Context;

use order_pipeline::domain::order::{sample_order, sample_variant};
use order_pipeline::messaging::OrderProducer;
use order_pipeline::telemetry;

// Publishes the reference order followed by numbered variants.
//
//   producer [VARIANTS]     (default 12)
//
// Reads KAFKA_BROKERS and KAFKA_TOPIC like the service does.

const REFERENCE_ORDER_UID: &str = "b563feb7b2b84b6test";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init(&std::env::var("ENV").unwrap_or_else(|_| "local".to_string()));

    let variants: u32 = match std::env::args().nth(1) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("variant count must be a number, got {raw:?}"))?,
        None => 12,
    };

    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "127.0.0.1:9092".to_string());
    let topic = std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "orders".to_string());
    let producer = OrderProducer::new(&brokers, &topic)?;

    let reference = sample_order(REFERENCE_ORDER_UID);
    let mut sent = 0u32;
    let mut failed = 0u32;

    let mut orders = vec![reference.clone()];
    for i in 1..=variants {
        let order = sample_variant(&reference, i)
            .with_context(|| format!("variant {i} overflows the payment amount"))?;
        orders.push(order);
    }

    for order in &orders {
        match producer.publish_order(order).await {
            Ok(()) => sent += 1,
            Err(e) => {
                failed += 1;
                tracing::error!(order_uid = %order.order_uid, error = %e, "Giving up on order");
            }
        }
    }

    tracing::info!(topic = %producer.topic(), sent = sent, failed = failed, "Done");

    if failed > 0 {
        anyhow::bail!("{failed} of {} orders were not published", orders.len());
    }
    Ok(())
}
