pub mod rate_limiter;

pub use rate_limiter::{KvError, KvStore, RateLimitDecision, RateLimiter, RedisKvStore};
