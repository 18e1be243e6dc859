use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::models::LockLease;
use crate::{SchedulerError, SchedulerResult};

/// 分布式互斥锁
///
/// 所有权由每次获取时生成的随机令牌证明，而不是由调用进程的身份证明。
/// 所有需要校验令牌的操作都必须在存储端原子完成。
///
/// 任何操作返回错误时，调用方都应按"未获取到锁"处理。
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 仅当 `key` 当前没有记录时创建锁记录，不阻塞
    async fn try_acquire(&self, key: &str, ttl: Duration) -> SchedulerResult<Option<LockLease>>;

    /// 令牌匹配时删除锁记录，返回是否删除；不存在或被他人持有时为空操作
    async fn release(&self, key: &str, owner: &str) -> SchedulerResult<bool>;

    /// 令牌匹配时重置TTL，返回是否续期成功
    async fn extend(&self, key: &str, owner: &str, ttl: Duration) -> SchedulerResult<bool>;

    async fn is_held(&self, key: &str) -> SchedulerResult<bool>;

    /// 没有记录时返回 false
    async fn is_held_by_me(&self, key: &str, owner: &str) -> SchedulerResult<bool>;
}

/// 锁TTL必须至少为1毫秒
pub fn validate_lock_ttl(ttl: Duration) -> SchedulerResult<()> {
    if ttl.as_millis() == 0 {
        return Err(SchedulerError::InvalidArgument(format!(
            "锁TTL必须至少为1毫秒: {ttl:?}"
        )));
    }
    Ok(())
}

/// 带指数退避的获取
///
/// 锁本身不提供等待队列，需要等待的调用方使用此函数重试。
/// 最多尝试 `attempts` 次，每次失败后等待时间翻倍。
pub async fn acquire_with_retry(
    lock: &dyn DistributedLock,
    key: &str,
    ttl: Duration,
    attempts: u32,
    initial_backoff: Duration,
) -> SchedulerResult<Option<LockLease>> {
    let mut backoff = initial_backoff;
    for attempt in 1..=attempts {
        if let Some(lease) = lock.try_acquire(key, ttl).await? {
            return Ok(Some(lease));
        }
        if attempt < attempts {
            debug!(lock_key = key, attempt, "锁被占用，{:?}后重试", backoff);
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }
    Ok(None)
}
