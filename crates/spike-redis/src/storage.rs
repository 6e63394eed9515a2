// Redis counter store: CounterStore over INCR / EXPIRE / TTL.
//
// Keys are namespaced with a configurable prefix so one Redis database can
// be shared with other applications.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use spike_core::db::counter_store::{CounterStore, CounterStoreError};

// ─── Redis-Like Connection Trait ─────────────────────────────────

/// The three commands the counter store needs.
///
/// Implemented for `redis::aio::ConnectionManager`; tests plug in a fake.
#[async_trait]
pub trait RedisLikeConnection: Send + Sync {
    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError>;
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CounterStoreError>;
    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError>;
}

fn redis_err(e: redis::RedisError) -> CounterStoreError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        CounterStoreError::Connection(e.to_string())
    } else {
        CounterStoreError::Other(e.to_string())
    }
}

#[async_trait]
impl RedisLikeConnection for ConnectionManager {
    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError> {
        // ConnectionManager clones share one multiplexed connection.
        let mut conn = self.clone();
        AsyncCommands::incr::<_, _, i64>(&mut conn, key, 1).await.map_err(redis_err)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CounterStoreError> {
        let mut conn = self.clone();
        let secs = i64::try_from(seconds).unwrap_or(i64::MAX);
        AsyncCommands::expire::<_, bool>(&mut conn, key, secs).await.map_err(redis_err)
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError> {
        let mut conn = self.clone();
        AsyncCommands::ttl::<_, i64>(&mut conn, key).await.map_err(redis_err)
    }
}

// ─── Counter Store ───────────────────────────────────────────────

pub const DEFAULT_PREFIX: &str = "spike:";

pub struct RedisCounterStore<C: RedisLikeConnection> {
    conn: C,
    /// Key prefix for namespacing.
    pub prefix: String,
}

impl<C: RedisLikeConnection> std::fmt::Debug for RedisCounterStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl<C: RedisLikeConnection> RedisCounterStore<C> {
    pub fn new(conn: C) -> Self {
        Self::with_prefix(conn, DEFAULT_PREFIX)
    }

    pub fn with_prefix(conn: C, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl RedisCounterStore<ConnectionManager> {
    /// Open a managed (auto-reconnecting) connection to `url`.
    pub async fn connect(url: &str, prefix: Option<&str>) -> Result<Self, CounterStoreError> {
        let client = Client::open(url).map_err(redis_err)?;
        let conn = ConnectionManager::new(client).await.map_err(redis_err)?;
        Ok(Self::with_prefix(conn, prefix.unwrap_or(DEFAULT_PREFIX)))
    }
}

#[async_trait]
impl<C: RedisLikeConnection + 'static> CounterStore for RedisCounterStore<C> {
    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError> {
        self.conn.incr(&self.prefixed(key)).await
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CounterStoreError> {
        self.conn.expire(&self.prefixed(key), seconds).await
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError> {
        self.conn.ttl(&self.prefixed(key)).await
    }
}
