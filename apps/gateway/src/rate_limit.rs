//! Sliding-window rate limiter over a Redis sorted set, one per (class, ip) pair.
//!
//! Grounded on `job_queue::dlq`'s sorted-set-as-index idiom, generalized from an
//! ordering index to a time window: each request is scored by its own arrival
//! time, and entries older than the window are purged before counting.

use redis::AsyncCommands;
use uuid::Uuid;

const BLACKLIST_KEY: &str = "ratelimit:blacklist";
const WINDOW_SECS: i64 = 60;

#[derive(Clone)]
pub struct RateLimiter {
    conn: redis::aio::ConnectionManager,
}

impl RateLimiter {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// `true` if the request is allowed; `false` if the ip is blacklisted or the
    /// sliding window for `class` is at or above `limit`.
    pub async fn check(&self, class: &str, ip: &str, limit: u32) -> redis::RedisResult<bool> {
        let mut conn = self.conn.clone();

        let blacklisted: bool = conn.sismember(BLACKLIST_KEY, ip).await?;
        if blacklisted {
            return Ok(false);
        }

        let key = format!("ratelimit:{class}:{ip}");
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_start = now_ms - WINDOW_SECS * 1000;

        let _: () = conn.zrembyscore(&key, i64::MIN, window_start).await?;
        let count: u64 = conn.zcard(&key).await?;
        if count >= limit as u64 {
            return Ok(false);
        }

        let member = Uuid::new_v4().to_string();
        let _: () = conn.zadd(&key, member, now_ms).await?;
        let _: () = conn.expire(&key, WINDOW_SECS).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blacklist_and_window_keys_are_namespaced_by_class_and_ip() {
        let key = format!("ratelimit:{}:{}", "chat", "1.2.3.4");
        assert_eq!(key, "ratelimit:chat:1.2.3.4");
        assert_eq!(BLACKLIST_KEY, "ratelimit:blacklist");
    }
}
