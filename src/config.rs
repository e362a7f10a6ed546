use anyhow::{anyhow, Context};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::messaging::{ConsumerSettings, KafkaSettings};
use crate::service::ServiceSettings;
use crate::store::PgSettings;
use crate::utils::RetryConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Everything comes from environment variables, optionally seeded from a
// `.env` file in the working directory. Only DATABASE_URL is required.
// A variable that is set but does not parse is an error naming it.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// local | dev | anything else (selects the log format)
    pub environment: String,
    pub http_addr: SocketAddr,
    pub postgres: PgSettings,
    pub redis_url: String,
    pub kafka: KafkaSettings,
    pub service: ServiceSettings,
    pub consumer: ConsumerSettings,
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let postgres = PgSettings {
            url: vars
                .string("DATABASE_URL")
                .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?,
            max_connections: vars.parse("DB_MAX_CONNECTIONS", 10)?,
            min_connections: vars.parse("DB_MIN_CONNECTIONS", 2)?,
            acquire_timeout: Duration::from_secs(vars.parse("DB_ACQUIRE_TIMEOUT_SECS", 5)?),
            max_lifetime: Duration::from_secs(vars.parse("DB_MAX_LIFETIME_SECS", 3600)?),
        };

        let kafka = KafkaSettings {
            brokers: vars.string_or("KAFKA_BROKERS", "127.0.0.1:9092"),
            group_id: vars.string_or("KAFKA_GROUP_ID", "orders-ingest"),
            topic: vars.string_or("KAFKA_TOPIC", "orders"),
        };

        let service = ServiceSettings {
            cache_ttl: Duration::from_secs(vars.parse("CACHE_TTL_SECS", 86_400)?),
            cache_read_timeout: Duration::from_millis(vars.parse("CACHE_READ_TIMEOUT_MS", 200)?),
            cache_write_timeout: Duration::from_millis(vars.parse("CACHE_WRITE_TIMEOUT_MS", 1000)?),
        };

        let retry = RetryConfig {
            max_attempts: vars.parse("RETRY_MAX_ATTEMPTS", 15)?,
            initial_delay: Duration::from_millis(vars.parse("RETRY_INITIAL_DELAY_MS", 1000)?),
            max_delay: Duration::from_millis(vars.parse("RETRY_MAX_DELAY_MS", 15_000)?),
            multiplier: 2.0,
        };
        if retry.max_attempts == 0 {
            return Err(anyhow!("RETRY_MAX_ATTEMPTS must be at least 1"));
        }

        let consumer = ConsumerSettings {
            retry,
            fetch_error_backoff: Duration::from_millis(vars.parse("FETCH_ERROR_BACKOFF_MS", 1000)?),
        };

        Ok(Self {
            environment: vars.string_or("ENV", "local"),
            http_addr: vars.parse("HTTP_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            postgres,
            redis_url: vars.string_or("REDIS_URL", "redis://127.0.0.1:6379"),
            kafka,
            service,
            consumer,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.string(key) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("{key} has an invalid value: {raw:?}")),
            None => Ok(default),
        }
    }
}
