use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{Cache, CacheError};

// ============================================================================
// In-Memory Cache
// ============================================================================
//
// Test double honouring per-key expiry. Uses tokio's clock so paused-time
// tests can expire entries by advancing time.
//
// ============================================================================

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
    get_delay: Mutex<Option<Duration>>,
    get_calls: AtomicU32,
    set_calls: AtomicU32,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Make every `get` take at least `delay`
    pub fn slow_gets(&self, delay: Duration) {
        if let Ok(mut slot) = self.get_delay.lock() {
            *slot = Some(delay);
        }
    }

    pub fn evict(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    /// True if `key` holds a value that has not expired
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(key)
                    .is_some_and(|entry| entry.expires_at > Instant::now())
            })
            .unwrap_or(false)
    }

    /// TTL the live value under `key` was stored with
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).map(|entry| entry.ttl))
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> u32 {
        self.set_calls.load(Ordering::SeqCst)
    }
}

fn poisoned() -> CacheError {
    CacheError::Unavailable("memory cache lock poisoned".into())
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("injected set failure".into()));
        }

        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
            ttl,
        };
        self.entries
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), entry);

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.get_delay.lock().ok().and_then(|slot| *slot);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("injected get failure".into()));
        }

        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                Err(CacheError::Miss)
            }
            None => Err(CacheError::Miss),
        }
    }
}
