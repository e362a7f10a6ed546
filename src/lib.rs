//! Order ingestion pipeline: Kafka in, PostgreSQL as the system of record,
//! Redis as a read-through cache, HTTP for point lookups.

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use metrics::Metrics;
pub use service::{OrderService, ServiceError, ServiceSettings};
