use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{RateLimitError, RateLimitOutcome, RateLimitPolicy, RateLimitStore};

/// Trim, count and conditionally append in one round trip so concurrent
/// callers cannot both take the last slot.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count < limit then
    redis.call('ZADD', key, now, member)
    redis.call('PEXPIRE', key, window)
    return {1, count + 1, 0}
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
return {0, count, tonumber(oldest[2])}
"#;

/// Sorted-set call logs scored by epoch milliseconds.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    conn: ConnectionManager,
    script: Script,
}

impl RedisRateLimitStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
        }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitOutcome, RateLimitError> {
        let now_ms = epoch_millis();
        let window_ms = i64::try_from(policy.window.as_millis()).unwrap_or(i64::MAX);
        let member = format!("{now_ms}-{}", Uuid::new_v4());

        let mut conn = self.conn.clone();
        let (allowed, count, oldest_ms): (i64, i64, i64) = self
            .script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(policy.limit)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| RateLimitError::Backend(err.to_string()))?;

        Ok(outcome(allowed, count, oldest_ms, now_ms, window_ms, policy.limit))
    }
}

fn epoch_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

fn outcome(
    allowed: i64,
    count: i64,
    oldest_ms: i64,
    now_ms: i64,
    window_ms: i64,
    limit: u32,
) -> RateLimitOutcome {
    if allowed == 1 {
        let used = u32::try_from(count).unwrap_or(limit);
        return RateLimitOutcome::Allowed {
            remaining: limit.saturating_sub(used),
        };
    }

    let wait_ms = (oldest_ms + window_ms - now_ms).max(0);
    RateLimitOutcome::Rejected {
        retry_after: Duration::from_millis(u64::try_from(wait_ms).unwrap_or(0)),
    }
}
