use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use summary_core::models::LockLease;
use summary_core::traits::{validate_lock_ttl, DistributedLock};
use summary_core::{SchedulerError, SchedulerResult};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct LockRecord {
    owner: String,
    expires_at: Instant,
}

impl LockRecord {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub(crate) fn poison_err<T>(_: PoisonError<T>) -> SchedulerError {
    SchedulerError::Internal("in-memory store lock poisoned".to_string())
}

/// 过期记录的清理间隔
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct LockTable {
    by_key: HashMap<String, LockRecord>,
    last_sweep: Instant,
}

impl LockTable {
    /// 当前仍然有效的记录，顺便清理已过期的
    fn live_record(&mut self, key: &str) -> Option<LockRecord> {
        let now = Instant::now();
        match self.by_key.get(key) {
            Some(record) if record.is_live(now) => Some(record.clone()),
            Some(_) => {
                self.by_key.remove(key);
                None
            }
            None => None,
        }
    }

    /// 从未再被访问的过期键只能靠这里回收
    fn sweep_if_due(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        self.by_key.retain(|_, record| record.is_live(now));
        self.last_sweep = now;
    }
}

/// 进程内锁
///
/// 语义与Redis实现一致，过期基于 `tokio::time::Instant`，
/// 只能协调同一进程内的多个消费者。
#[derive(Debug)]
pub struct InMemoryLock {
    records: Mutex<LockTable>,
}

impl Default for InMemoryLock {
    fn default() -> Self {
        Self {
            records: Mutex::new(LockTable {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> SchedulerResult<MutexGuard<'_, LockTable>> {
        self.records.lock().map_err(poison_err)
    }

    /// 当前保存的记录数，包括尚未清理的过期记录
    pub fn tracked_keys(&self) -> usize {
        self.records.lock().map(|t| t.by_key.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> SchedulerResult<Option<LockLease>> {
        validate_lock_ttl(ttl)?;
        let mut records = self.records()?;
        if records.live_record(key).is_some() {
            return Ok(None);
        }
        let now = Instant::now();
        records.sweep_if_due(now);
        let lease = LockLease::new(key, ttl);
        records.by_key.insert(
            key.to_string(),
            LockRecord {
                owner: lease.owner.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(Some(lease))
    }

    async fn release(&self, key: &str, owner: &str) -> SchedulerResult<bool> {
        let mut records = self.records()?;
        match records.live_record(key) {
            Some(record) if record.owner == owner => {
                records.by_key.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn extend(&self, key: &str, owner: &str, ttl: Duration) -> SchedulerResult<bool> {
        validate_lock_ttl(ttl)?;
        let mut records = self.records()?;
        if !matches!(records.live_record(key), Some(record) if record.owner == owner) {
            return Ok(false);
        }
        if let Some(record) = records.by_key.get_mut(key) {
            record.expires_at = Instant::now() + ttl;
        }
        Ok(true)
    }

    async fn is_held(&self, key: &str) -> SchedulerResult<bool> {
        let mut records = self.records()?;
        Ok(records.live_record(key).is_some())
    }

    async fn is_held_by_me(&self, key: &str, owner: &str) -> SchedulerResult<bool> {
        let mut records = self.records()?;
        Ok(matches!(records.live_record(key), Some(record) if record.owner == owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_fails_while_held() {
        let lock = InMemoryLock::new();
        let ttl = Duration::from_secs(30);

        let lease = lock.try_acquire("summary:daily:1:2024-01-01", ttl).await.unwrap();
        assert!(lease.is_some());
        assert!(lock.try_acquire("summary:daily:1:2024-01-01", ttl).await.unwrap().is_none());
        assert!(lock.try_acquire("summary:daily:2:2024-01-01", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_with_foreign_token_is_noop() {
        let lock = InMemoryLock::new();
        let lease = lock.try_acquire("k", Duration::from_secs(30)).await.unwrap().unwrap();

        assert!(!lock.release("k", "someone-else").await.unwrap());
        assert!(lock.is_held("k").await.unwrap());
        assert!(lock.is_held_by_me("k", &lease.owner).await.unwrap());

        assert!(lock.release("k", &lease.owner).await.unwrap());
        assert!(!lock.is_held("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_missing_key_is_noop() {
        let lock = InMemoryLock::new();
        assert!(!lock.release("absent", "token").await.unwrap());
        assert!(!lock.is_held_by_me("absent", "token").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lock_can_be_reacquired() {
        let lock = InMemoryLock::new();
        let ttl = Duration::from_secs(10);
        let first = lock.try_acquire("k", ttl).await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(!lock.is_held("k").await.unwrap());
        let second = lock.try_acquire("k", ttl).await.unwrap().unwrap();
        assert_ne!(first.owner, second.owner);

        // 过期的持有者不能释放新持有者的锁
        assert!(!lock.release("k", &first.owner).await.unwrap());
        assert!(lock.is_held_by_me("k", &second.owner).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_keeps_lock_alive() {
        let lock = InMemoryLock::new();
        let ttl = Duration::from_secs(10);
        let lease = lock.try_acquire("k", ttl).await.unwrap().unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(lock.extend("k", &lease.owner, ttl).await.unwrap());
        assert!(!lock.extend("k", "intruder", ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(lock.is_held_by_me("k", &lease.owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let lock = InMemoryLock::new();
        assert!(lock.try_acquire("k", Duration::ZERO).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_records_are_swept_on_acquire() {
        let lock = InMemoryLock::new();
        let ttl = Duration::from_secs(5);
        for user in 0..1000 {
            lock.try_acquire(&format!("summary:daily:{user}:2024-01-01"), ttl)
                .await
                .unwrap()
                .unwrap();
        }
        let held = lock.try_acquire("held", Duration::from_secs(600)).await.unwrap().unwrap();
        assert_eq!(lock.tracked_keys(), 1001);

        tokio::time::advance(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        lock.try_acquire("fresh", ttl).await.unwrap().unwrap();

        assert_eq!(lock.tracked_keys(), 2);
        assert!(lock.is_held_by_me("held", &held.owner).await.unwrap());
    }
}
