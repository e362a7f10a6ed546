use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

use super::{OrderStore, StoreError, WriteOutcome};
use crate::domain::order::Order;

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// Test double with the same idempotency contract as PgOrderStore. The
// identifier check and the insert happen under one lock, which plays the
// part of the uniqueness constraint.
//
// Knobs for failure-path tests:
// - fail_writes / fail_reads      - every call fails with Unavailable
// - fail_next_writes(n)           - the next n writes fail, then recover
// - write_calls / write_instants  - how often and when writes were attempted
//
// ============================================================================

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    failing_writes_left: AtomicU32,
    write_calls: AtomicU32,
    read_calls: AtomicU32,
    write_instants: Mutex<Vec<Instant>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes_left.store(count, Ordering::SeqCst);
    }

    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// When each write attempt started, oldest first
    pub fn write_instants(&self) -> Vec<Instant> {
        self.write_instants
            .lock()
            .map(|instants| instants.clone())
            .unwrap_or_default()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().map(|orders| orders.len()).unwrap_or(0)
    }

    pub fn contains(&self, order_uid: &str) -> bool {
        self.orders
            .lock()
            .map(|orders| orders.contains_key(order_uid))
            .unwrap_or(false)
    }

    fn injected_write_failure(&self) -> bool {
        if self.fail_writes.load(Ordering::SeqCst) {
            return true;
        }
        self.failing_writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn write_order(&self, order: &Order) -> Result<WriteOutcome, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut instants) = self.write_instants.lock() {
            instants.push(Instant::now());
        }

        if self.injected_write_failure() {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }

        let mut orders = self.orders.lock().map_err(|_| poisoned())?;
        if orders.contains_key(&order.order_uid) {
            return Ok(WriteOutcome::AlreadyExists);
        }
        orders.insert(order.order_uid.clone(), order.clone());

        Ok(WriteOutcome::Inserted)
    }

    async fn read_order(&self, order_uid: &str) -> Result<Order, StoreError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }

        let orders = self.orders.lock().map_err(|_| poisoned())?;
        orders
            .get(order_uid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))
    }
}
