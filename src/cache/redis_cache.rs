use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, RedisError};
use std::time::Duration;

use super::{Cache, CacheError};

// ============================================================================
// Redis Cache
// ============================================================================
//
// A ConnectionManager, cloned per call. Clones share one multiplexed socket,
// so the cache can be used from the HTTP workers and the consumer at the same
// time without locking. When the socket drops, the manager reconnects in the
// background; calls made while it is down fail with Unavailable and callers
// fall back to the store.
//
// Expiry is left to Redis (SET ... PX <ttl>).
//
// ============================================================================

impl From<RedisError> for CacheError {
    fn from(e: RedisError) -> Self {
        CacheError::Unavailable(e.into())
    }
}

const RECONNECT_RETRIES: usize = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect and PING once so a bad URL fails at startup, not on first read
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(RECONNECT_RETRIES)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let mut conn = ConnectionManager::new_with_config(client, config).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!(reply = %pong, "Redis connected");

        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[tracing::instrument(name = "redis.set", skip_all, fields(key = %key), err)]
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(key = %key, ttl_ms = ttl_ms, "Cached value");
        Ok(())
    }

    #[tracing::instrument(name = "redis.get", skip_all, fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let mut conn = self.conn.clone();

        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        value.ok_or(CacheError::Miss)
    }
}

// ============================================================================
// Integration Tests
// ============================================================================
//
// These need a running Redis. Run with:
//   TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
//
// ============================================================================
