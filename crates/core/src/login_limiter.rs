use std::sync::Arc;
use std::time::Duration;

use crate::models::RateLimitDecision;
use crate::traits::{validate_rate_limit, RateLimiter};
use crate::{SchedulerError, SchedulerResult};

/// 登录失败次数限制
///
/// 把固定的 `(limit, window)` 绑定到以调用方标识（邮箱、IP等）派生的命名空间键上。
pub struct LoginAttemptLimiter {
    limiter: Arc<dyn RateLimiter>,
    limit: u32,
    window: Duration,
    namespace: String,
}

impl LoginAttemptLimiter {
    pub fn new(limiter: Arc<dyn RateLimiter>, limit: u32, window: Duration) -> SchedulerResult<Self> {
        validate_rate_limit(limit, window).map_err(|e| SchedulerError::Configuration(e.to_string()))?;
        Ok(Self {
            limiter,
            limit,
            window,
            namespace: "login_attempts".to_string(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn key_for(&self, identifier: &str) -> String {
        format!("{}:{}", self.namespace, identifier.trim().to_lowercase())
    }

    /// 记录一次尝试并返回是否允许
    pub async fn check(&self, identifier: &str) -> SchedulerResult<RateLimitDecision> {
        self.limiter
            .is_allowed(&self.key_for(identifier), self.limit, self.window)
            .await
    }

    /// 登录成功后清空计数
    pub async fn reset(&self, identifier: &str) -> SchedulerResult<()> {
        self.limiter.reset(&self.key_for(identifier)).await
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
