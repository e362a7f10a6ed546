// ============================================================================
// Cache - Disposable, Time-Bounded Copies
// ============================================================================
//
// Byte-oriented key/value store with per-key expiry enforced by the cache
// itself. Callers must tell a miss apart from every other failure: only a
// miss is an expected outcome, everything else is degradation that gets
// logged before the caller falls back to the store.
//
// Implementations:
// - RedisCache  - Redis over a multiplexed async connection
// - MemoryCache - in-process double for tests
//
// ============================================================================

mod memory;
mod redis_cache;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Key absent or expired
    #[error("cache miss")]
    Miss,

    #[error("cache unavailable: {0}")]
    Unavailable(#[source] BoxError),

    /// Stored bytes could not be encoded or decoded
    #[error("cache value is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;
}

/// Serialize `value` as JSON and store it under `key`
pub async fn put_json<T>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    cache.set(key, bytes, ttl).await
}

/// Fetch `key` and decode it from JSON
pub async fn get_json<T>(cache: &dyn Cache, key: &str) -> Result<T, CacheError>
where
    T: DeserializeOwned,
{
    let bytes = cache.get(key).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
