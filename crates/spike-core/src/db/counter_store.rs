// Counter store: integer counters with expiry, the backing for fixed-window
// rate limiting.
//
// The trait mirrors the three Redis primitives it is modelled on. `ttl`
// keeps Redis' conventions: -2 for a missing key, -1 for a key without
// expiry, otherwise the remaining whole seconds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Remaining-TTL value for a key that does not exist.
pub const TTL_MISSING: i64 = -2;
/// Remaining-TTL value for a key that exists but never expires.
pub const TTL_PERSISTENT: i64 = -1;

/// Errors from counter store operations.
#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Counter store error: {0}")]
    Other(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Atomically increment `key` by one, creating it at 1 when missing.
    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError>;

    /// Set the key's time-to-live. Returns `false` when the key is missing.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CounterStoreError>;

    /// Remaining time-to-live in seconds (see module docs for the sentinels).
    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError>;
}

#[derive(Debug, Clone)]
struct Counter {
    value: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// In-process counter store.
///
/// Each operation takes the write lock once, so `incr` is atomic with respect
/// to other callers. Uses `tokio::time::Instant` so paused-clock tests can
/// move through a window without sleeping.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<RwLock<HashMap<String, Counter>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters.
    pub async fn cleanup(&self) {
        prune(&self.counters).await;
    }

    /// Run [`cleanup`](Self::cleanup) every `period` on a background task.
    ///
    /// Expired counters are otherwise only reset when their key is hit
    /// again. The task ends once the last handle to the store is dropped.
    pub fn spawn_cleanup(&self, period: Duration) -> JoinHandle<()> {
        let counters = Arc::downgrade(&self.counters);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(counters) = counters.upgrade() else {
                    break;
                };
                prune(&counters).await;
            }
        })
    }

    /// Number of stored counters, including expired ones not yet pruned.
    pub async fn len(&self) -> usize {
        self.counters.read().await.len()
    }
}

async fn prune(counters: &RwLock<HashMap<String, Counter>>) {
    let now = Instant::now();
    counters.write().await.retain(|_, c| !c.is_expired(now));
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        if counter.is_expired(now) {
            counter.value = 0;
            counter.expires_at = None;
        }
        counter.value += 1;
        Ok(counter.value)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CounterStoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        match counters.get_mut(key) {
            Some(counter) if !counter.is_expired(now) => {
                counter.expires_at = Some(now + Duration::from_secs(seconds));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterStoreError> {
        let now = Instant::now();
        let counters = self.counters.read().await;
        Ok(match counters.get(key) {
            None => TTL_MISSING,
            Some(counter) if counter.is_expired(now) => TTL_MISSING,
            Some(Counter { expires_at: None, .. }) => TTL_PERSISTENT,
            Some(Counter {
                expires_at: Some(exp),
                ..
            }) => {
                // Round up like Redis does for a partially elapsed second.
                let remaining = exp.duration_since(now);
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                secs as i64
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_creates_and_counts() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.incr("k").await.unwrap(), 2);
        assert_eq!(store.incr("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ttl_sentinels() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.ttl("missing").await.unwrap(), TTL_MISSING);
        store.incr("k").await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), TTL_PERSISTENT);
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = MemoryCounterStore::new();
        assert!(!store.expire("missing", 60).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_resets_after_window() {
        let store = MemoryCounterStore::new();
        store.incr("k").await.unwrap();
        assert!(store.expire("k", 60).await.unwrap());
        assert_eq!(store.ttl("k").await.unwrap(), 60);

        tokio::time::advance(Duration::from_millis(30_500)).await;
        assert_eq!(store.ttl("k").await.unwrap(), 30);
        assert_eq!(store.incr("k").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.ttl("k").await.unwrap(), TTL_MISSING);
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.ttl("k").await.unwrap(), TTL_PERSISTENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_and_len() {
        let store = MemoryCounterStore::new();
        store.incr("short").await.unwrap();
        store.expire("short", 1).await.unwrap();
        store.incr("long").await.unwrap();
        assert_eq!(store.len().await, 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.len().await, 2);
        store.cleanup().await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cleanup_prunes_expired_keys() {
        let store = MemoryCounterStore::new();
        let task = store.spawn_cleanup(Duration::from_secs(10));

        for i in 0..100 {
            let key = format!("signup:ip:10.9.9.{i}");
            store.incr(&key).await.unwrap();
            store.expire(&key, 5).await.unwrap();
        }
        store.incr("signup:ip:live").await.unwrap();
        store.expire("signup:ip:live", 60).await.unwrap();
        assert_eq!(store.len().await, 101);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(store.len().await, 1);
        assert!(store.ttl("signup:ip:live").await.unwrap() > 0);

        drop(store);
        task.await.unwrap();
    }
}
