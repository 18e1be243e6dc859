use std::time::Duration;

use async_trait::async_trait;

use crate::models::RateLimitDecision;
use crate::{SchedulerError, SchedulerResult};

/// 滑动窗口限流器
///
/// 每次调用原子地：清除早于 `now - window` 的记录，统计剩余记录数，
/// 未达上限时插入一条 `now` 的记录。
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn is_allowed(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> SchedulerResult<RateLimitDecision>;

    /// 删除 `key` 的全部记录
    async fn reset(&self, key: &str) -> SchedulerResult<()>;
}

pub fn validate_rate_limit(limit: u32, window: Duration) -> SchedulerResult<()> {
    if limit == 0 {
        return Err(SchedulerError::InvalidArgument(
            "限流上限必须大于0".to_string(),
        ));
    }
    if window.as_millis() == 0 {
        return Err(SchedulerError::InvalidArgument(format!(
            "限流窗口必须至少为1毫秒: {window:?}"
        )));
    }
    Ok(())
}
