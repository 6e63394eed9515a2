//! Bearer token cache.
//!
//! One token per gateway client. Callers that find the cache cold wait on the
//! same lock, so only one of them talks to the token endpoint.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::types::TokenResponse;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token if it is valid for at least `margin` more,
    /// otherwise run `fetch` and cache its result.
    pub async fn get_or_fetch<F, Fut>(&self, margin: Duration, fetch: F) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TokenResponse, GatewayError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() + margin < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let fresh = fetch().await?;
        tracing::debug!(expires_in = fresh.expires_in, "Fetched gateway access token");
        *slot = Some(CachedToken {
            token: fresh.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });
        Ok(fresh.access_token)
    }

    /// Drop the cached token.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    pub async fn is_empty(&self) -> bool {
        self.slot.lock().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token(value: &str, expires_in: u64) -> TokenResponse {
        TokenResponse {
            access_token: value.to_string(),
            expires_in,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reuses_token_until_margin() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);
        let margin = Duration::from_secs(60);

        for _ in 0..3 {
            let t = cache
                .get_or_fetch(margin, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(token("t1", 300))
                })
                .await
                .unwrap();
            assert_eq!(t, "t1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // 250s in: only 50s left, inside the 60s margin.
        tokio::time::advance(Duration::from_secs(250)).await;
        let t = cache
            .get_or_fetch(margin, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(token("t2", 300))
            })
            .await
            .unwrap();
        assert_eq!(t, "t2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = TokenCache::new();
        let margin = Duration::from_secs(60);
        cache
            .get_or_fetch(margin, || async { Ok(token("t1", 3600)) })
            .await
            .unwrap();
        assert!(!cache.is_empty().await);

        cache.invalidate().await;
        assert!(cache.is_empty().await);
        let t = cache
            .get_or_fetch(margin, || async { Ok(token("t2", 3600)) })
            .await
            .unwrap();
        assert_eq!(t, "t2");
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_cache_empty() {
        let cache = TokenCache::new();
        let result = cache
            .get_or_fetch(Duration::from_secs(60), || async {
                Err(GatewayError::Http("connection refused".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }
}
