//! Distributed, fail-open, fixed-window rate limiter (4.D) over a shared KV
//! store. The counter is incremented before the request is admitted, and
//! never decremented on downstream failure, so a failed upload still
//! consumes quota.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv store unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increments `key`, setting its TTL to `window_ms` only on
    /// the increment that creates the key. Returns `(count, ttl_ms)`.
    async fn incr_with_expiry(&self, key: &str, window_ms: u64) -> Result<(i64, i64), KvError>;

    async fn flush_for_tests(&self) -> Result<(), KvError>;
}

pub struct RedisKvStore {
    manager: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(redis_url: &str) -> Result<Self, KvError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| KvError::Unreachable(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::Unreachable(e.to_string()))?;
        Ok(RedisKvStore { manager })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn incr_with_expiry(&self, key: &str, window_ms: u64) -> Result<(i64, i64), KvError> {
        let mut conn = self.manager.clone();
        let count: i64 = conn
            .incr(key, 1)
            .await
            .map_err(|e| KvError::Unreachable(e.to_string()))?;

        if count == 1 {
            let _: () = conn
                .pexpire(key, window_ms as i64)
                .await
                .map_err(|e| KvError::Unreachable(e.to_string()))?;
        }

        let ttl: i64 = conn
            .pttl(key)
            .await
            .map_err(|e| KvError::Unreachable(e.to_string()))?;
        // A race between the two round trips above can leave ttl at -1
        // (no expiry) right after key creation; treat that as the full window.
        let ttl = if ttl < 0 { window_ms as i64 } else { ttl };

        Ok((count, ttl))
    }

    async fn flush_for_tests(&self) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::Unreachable(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
    pub retry_after_ms: Option<i64>,
}

pub struct RateLimiter<K: KvStore + ?Sized> {
    kv: Arc<K>,
    max: u32,
    window_ms: u64,
}

impl<K: KvStore + ?Sized> RateLimiter<K> {
    pub fn new(kv: Arc<K>, max: u32, window_ms: u64) -> Self {
        Self { kv, max, window_ms }
    }

    pub async fn check(&self, user_id: &str) -> RateLimitDecision {
        let key = format!("ratelimit:upload:{user_id}");

        match self.kv.incr_with_expiry(&key, self.window_ms).await {
            Ok((count, ttl_ms)) => {
                let now_ms = now_unix_ms();
                let reset_at_ms = now_ms + ttl_ms;
                if count as u32 > self.max {
                    RateLimitDecision {
                        allowed: false,
                        limit: self.max,
                        remaining: 0,
                        reset_at_ms,
                        retry_after_ms: Some(ttl_ms),
                    }
                } else {
                    RateLimitDecision {
                        allowed: true,
                        limit: self.max,
                        remaining: self.max - count as u32,
                        reset_at_ms,
                        retry_after_ms: None,
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id, "rate limiter KV store unreachable, failing open");
                RateLimitDecision {
                    allowed: true,
                    limit: self.max,
                    remaining: self.max,
                    reset_at_ms: now_unix_ms() + self.window_ms as i64,
                    retry_after_ms: None,
                }
            }
        }
    }
}

fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
