// Rate limiter: fixed-window counting over a shared `CounterStore`.
//
// A window opens on the first hit (the counter is created at 1 and given the
// window as its expiry) and closes when the store expires the key. Counting
// happens before the limit check, so the limit'th request in a window is
// the last one allowed.

use std::sync::Arc;

use spike_core::db::counter_store::{CounterStore, CounterStoreError};
use spike_core::options::{RateLimitOptions, RateLimitRule};

use super::MiddlewareError;

const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please try again later.";

/// Outcome of one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests seen in the current window, this one included.
    pub count: i64,
    /// Seconds until the window resets. Always at least 1.
    pub retry_after: u64,
}

/// `rate_limit:<action>:<scope>:<identity>`
pub fn rate_limit_key(action: &str, scope: &str, identity: &str) -> String {
    format!("rate_limit:{action}:{scope}:{identity}")
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    options: RateLimitOptions,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, options: RateLimitOptions) -> Self {
        Self { store, options }
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Count one request against `key` and decide whether it is allowed.
    pub async fn hit(
        &self,
        key: &str,
        limit: u64,
        window_secs: u64,
    ) -> Result<RateLimitDecision, CounterStoreError> {
        let count = self.store.incr(key).await?;
        if count == 1 {
            self.store.expire(key, window_secs).await?;
        }

        // Missing, persistent or just-expired keys report no usable TTL;
        // the full window is the honest upper bound then.
        let ttl = self.store.ttl(key).await?;
        let retry_after = if ttl > 0 { ttl as u64 } else { window_secs };

        Ok(RateLimitDecision {
            allowed: count <= i64::try_from(limit).unwrap_or(i64::MAX),
            count,
            retry_after: retry_after.max(1),
        })
    }

    async fn enforce(&self, key: String, rule: RateLimitRule) -> Result<(), MiddlewareError> {
        let decision = self
            .hit(&key, rule.max, rule.window)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Rate limit store failure");
                MiddlewareError::Store(e.to_string())
            })?;

        if decision.allowed {
            return Ok(());
        }

        tracing::warn!(
            key = %key,
            count = decision.count,
            limit = rule.max,
            retry_after = decision.retry_after,
            "Rate limit exceeded"
        );
        Err(MiddlewareError::TooManyRequests {
            retry_after: decision.retry_after,
            message: RATE_LIMIT_MESSAGE.into(),
        })
    }

    /// Signup guard: the per-IP rule first, then, only if it passed and a
    /// device id was supplied, the per-device rule.
    pub async fn check_signup(
        &self,
        ip: &str,
        device_id: Option<&str>,
    ) -> Result<(), MiddlewareError> {
        if !self.options.enabled {
            return Ok(());
        }

        self.enforce(rate_limit_key("signup", "ip", ip), self.options.signup_ip)
            .await?;

        if let Some(device_id) = device_id.map(str::trim).filter(|d| !d.is_empty()) {
            self.enforce(
                rate_limit_key("signup", "device", device_id),
                self.options.signup_device,
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use spike_core::db::counter_store::MemoryCounterStore;
    use std::time::Duration;

    fn limiter(store: MemoryCounterStore) -> RateLimiter {
        RateLimiter::new(Arc::new(store), RateLimitOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_th_request_allowed_next_rejected() {
        let limiter = limiter(MemoryCounterStore::new());

        for i in 1..=5 {
            let d = limiter.hit("k", 5, 60).await.unwrap();
            assert!(d.allowed, "request {i} should pass");
            assert_eq!(d.count, i);
        }
        let d = limiter.hit("k", 5, 60).await.unwrap();
        assert!(!d.allowed);
        assert!(d.retry_after > 0 && d.retry_after <= 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let limiter = limiter(MemoryCounterStore::new());
        for _ in 0..3 {
            limiter.hit("k", 2, 10).await.unwrap();
        }
        assert!(!limiter.hit("k", 2, 10).await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(4)).await;
        let d = limiter.hit("k", 2, 10).await.unwrap();
        assert_eq!(d.retry_after, 6);

        tokio::time::advance(Duration::from_secs(6)).await;
        let d = limiter.hit("k", 2, 10).await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.count, 1);
        assert_eq!(d.retry_after, 10);
    }

    /// Counts but never keeps an expiry, like a key whose EXPIRE was lost.
    #[derive(Debug, Default)]
    struct NoTtlStore(MemoryCounterStore);

    #[async_trait]
    impl CounterStore for NoTtlStore {
        async fn incr(&self, key: &str) -> Result<i64, CounterStoreError> {
            self.0.incr(key).await
        }
        async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool, CounterStoreError> {
            Ok(false)
        }
        async fn ttl(&self, _key: &str) -> Result<i64, CounterStoreError> {
            Ok(-1)
        }
    }

    #[tokio::test]
    async fn test_missing_ttl_falls_back_to_window() {
        let limiter = RateLimiter::new(Arc::new(NoTtlStore::default()), RateLimitOptions::default());
        let d = limiter.hit("k", 5, 60).await.unwrap();
        assert_eq!(d.retry_after, 60);
    }

    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn incr(&self, _key: &str) -> Result<i64, CounterStoreError> {
            Err(CounterStoreError::Connection("refused".into()))
        }
        async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool, CounterStoreError> {
            Err(CounterStoreError::Connection("refused".into()))
        }
        async fn ttl(&self, _key: &str) -> Result<i64, CounterStoreError> {
            Err(CounterStoreError::Connection("refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_not_a_rejection() {
        let limiter = RateLimiter::new(Arc::new(DownStore), RateLimitOptions::default());
        let err = limiter.check_signup("1.2.3.4", None).await.unwrap_err();
        assert!(matches!(err, MiddlewareError::Store(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signup_ip_rule_short_circuits_device_rule() {
        let store = MemoryCounterStore::new();
        let limiter = limiter(store.clone());

        for _ in 0..5 {
            limiter.check_signup("1.2.3.4", None).await.unwrap();
        }
        let err = limiter.check_signup("1.2.3.4", Some("dev-1")).await.unwrap_err();
        assert!(matches!(err, MiddlewareError::TooManyRequests { .. }));
        // The rejected request never reached the device counter.
        assert_eq!(store.ttl(&rate_limit_key("signup", "device", "dev-1")).await.unwrap(), -2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signup_device_rule() {
        let limiter = limiter(MemoryCounterStore::new());
        for i in 0..3 {
            limiter
                .check_signup(&format!("10.0.0.{i}"), Some("dev-1"))
                .await
                .unwrap();
        }
        let err = limiter.check_signup("10.0.0.9", Some("dev-1")).await.unwrap_err();
        match err {
            MiddlewareError::TooManyRequests { retry_after, .. } => {
                assert!(retry_after > 0 && retry_after <= 86_400)
            }
            other => panic!("unexpected {other:?}"),
        }
        // Blank device ids are not counted.
        limiter.check_signup("10.0.0.10", Some("  ")).await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_skips_store() {
        let options = RateLimitOptions { enabled: false, ..Default::default() };
        let limiter = RateLimiter::new(Arc::new(DownStore), options);
        assert!(!limiter.is_enabled());
        limiter.check_signup("1.2.3.4", Some("dev")).await.unwrap();
    }
}
