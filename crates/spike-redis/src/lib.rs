// spike-redis: Redis counter store for spike.
//
// Backs the signup rate limiter when several server processes must share
// counters. Any Redis client can be used through `RedisLikeConnection`.

pub mod storage;

pub use storage::{DEFAULT_PREFIX, RedisCounterStore, RedisLikeConnection};
