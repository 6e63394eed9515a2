//! Live Redis tests.
//!
//! These need a Redis instance at `redis://127.0.0.1/` and are ignored by
//! default. Run with `cargo test -p spike-redis -- --ignored`.

use spike_core::db::counter_store::CounterStore;
use spike_redis::RedisCounterStore;

const URL: &str = "redis://127.0.0.1/";

fn unique_prefix(test: &str) -> String {
    format!("spike-test:{}:{}:", test, std::process::id())
}

#[tokio::test]
#[ignore] // Requires Redis
async fn incr_expire_ttl_against_redis() {
    let store = match RedisCounterStore::connect(URL, Some(&unique_prefix("window"))).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Skipping test: Redis not available ({e})");
            return;
        }
    };

    assert_eq!(store.ttl("k").await.unwrap(), -2);
    assert_eq!(store.incr("k").await.unwrap(), 1);
    assert_eq!(store.ttl("k").await.unwrap(), -1);
    assert!(store.expire("k", 60).await.unwrap());
    let ttl = store.ttl("k").await.unwrap();
    assert!(ttl > 0 && ttl <= 60);
    assert_eq!(store.incr("k").await.unwrap(), 2);
    assert!(!store.expire("missing", 60).await.unwrap());

    // Leave nothing behind.
    assert!(store.expire("k", 1).await.unwrap());
}
