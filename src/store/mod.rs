// ============================================================================
// Order Store - System of Record
// ============================================================================
//
// Durable storage for the full order aggregate (order, delivery, payment,
// items).
//
// Idempotency: the write is conditioned on the order identifier's uniqueness
// constraint. A second write of the same order is a successful no-op and
// leaves delivery/payment/items untouched. There is no existence pre-check;
// the constraint alone decides.
//
// Implementations:
// - PgOrderStore     - PostgreSQL through a sqlx connection pool
// - MemoryOrderStore - in-process double for tests
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::domain::order::Order;

pub use memory::MemoryOrderStore;
pub use postgres::{PgOrderStore, PgSettings};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.into())
    }
}

/// What a successful write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The full aggregate was inserted
    Inserted,
    /// An order with this identifier already existed; nothing was written
    AlreadyExists,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the full aggregate atomically, or do nothing if the order id is
    /// already present.
    async fn write_order(&self, order: &Order) -> Result<WriteOutcome, StoreError>;

    /// Load the full aggregate, items in insertion order.
    async fn read_order(&self, order_uid: &str) -> Result<Order, StoreError>;
}
