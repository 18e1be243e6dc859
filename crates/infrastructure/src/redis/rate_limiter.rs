use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use summary_core::models::{generate_owner_token, RateLimitDecision};
use summary_core::traits::{validate_rate_limit, RateLimiter};
use summary_core::{SchedulerError, SchedulerResult};

use super::connection::{store_error, RedisConnection};
use super::scripts;

/// 基于Redis有序集合的滑动窗口限流器
pub struct RedisRateLimiter {
    connection: RedisConnection,
    script: Script,
}

impl RedisRateLimiter {
    pub fn new(connection: RedisConnection) -> Self {
        Self {
            connection,
            script: Script::new(scripts::SLIDING_WINDOW),
        }
    }

    fn window_key(&self, key: &str) -> String {
        self.connection.namespaced("ratelimit", key)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn is_allowed(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> SchedulerResult<RateLimitDecision> {
        validate_rate_limit(limit, window)?;
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let mut conn = self.connection.manager();

        let reply: Vec<i64> = self
            .script
            .key(self.window_key(key))
            .arg(limit)
            .arg(window_ms)
            .arg(generate_owner_token())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("sliding window script", e))?;

        match reply.as_slice() {
            [1, remaining, _] => Ok(RateLimitDecision::allowed(
                u32::try_from(*remaining).unwrap_or(0),
            )),
            [0, _, reset_ms] => Ok(RateLimitDecision::denied(Duration::from_millis(
                u64::try_from(*reset_ms).unwrap_or(0),
            ))),
            other => Err(SchedulerError::Store(format!(
                "Unexpected sliding window reply: {other:?}"
            ))),
        }
    }

    async fn reset(&self, key: &str) -> SchedulerResult<()> {
        let mut conn = self.connection.manager();
        let _: i64 = redis::cmd("DEL")
            .arg(self.window_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("DEL", e))?;
        Ok(())
    }
}
