use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use summary_core::models::LockLease;
use summary_core::traits::{validate_lock_ttl, DistributedLock};
use summary_core::SchedulerResult;
use tracing::debug;

use super::connection::{store_error, RedisConnection};
use super::scripts;

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// 基于Redis的分布式锁
///
/// 获取使用 `SET key token NX PX ttl`；释放和续期使用Lua脚本做比较后操作，
/// 避免"先读后写"之间的竞争。
pub struct RedisLock {
    connection: RedisConnection,
    release_script: Script,
    extend_script: Script,
}

impl RedisLock {
    pub fn new(connection: RedisConnection) -> Self {
        Self {
            connection,
            release_script: Script::new(scripts::RELEASE_LOCK),
            extend_script: Script::new(scripts::EXTEND_LOCK),
        }
    }

    fn lock_key(&self, key: &str) -> String {
        self.connection.namespaced("lock", key)
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> SchedulerResult<Option<LockLease>> {
        validate_lock_ttl(ttl)?;
        let lease = LockLease::new(key, ttl);
        let mut conn = self.connection.manager();

        let reply: Option<String> = redis::cmd("SET")
            .arg(self.lock_key(key))
            .arg(&lease.owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("SET NX", e))?;

        if reply.is_some() {
            debug!(lock_key = key, ttl_ms = ttl_millis(ttl), "获取锁成功");
            Ok(Some(lease))
        } else {
            debug!(lock_key = key, "锁已被其他持有者占用");
            Ok(None)
        }
    }

    async fn release(&self, key: &str, owner: &str) -> SchedulerResult<bool> {
        let mut conn = self.connection.manager();
        let deleted: i64 = self
            .release_script
            .key(self.lock_key(key))
            .arg(owner)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("release script", e))?;
        Ok(deleted == 1)
    }

    async fn extend(&self, key: &str, owner: &str, ttl: Duration) -> SchedulerResult<bool> {
        validate_lock_ttl(ttl)?;
        let mut conn = self.connection.manager();
        let extended: i64 = self
            .extend_script
            .key(self.lock_key(key))
            .arg(owner)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("extend script", e))?;
        Ok(extended == 1)
    }

    async fn is_held(&self, key: &str) -> SchedulerResult<bool> {
        let mut conn = self.connection.manager();
        let exists: bool = redis::cmd("EXISTS")
            .arg(self.lock_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("EXISTS", e))?;
        Ok(exists)
    }

    async fn is_held_by_me(&self, key: &str, owner: &str) -> SchedulerResult<bool> {
        let mut conn = self.connection.manager();
        let current: Option<String> = redis::cmd("GET")
            .arg(self.lock_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("GET", e))?;
        Ok(current.as_deref() == Some(owner))
    }
}
