// ============================================================================
// Domain Layer
// ============================================================================
//
// Plain data and business rules. Nothing in here talks to Kafka, Postgres or
// Redis.
//
// ============================================================================

pub mod order;
