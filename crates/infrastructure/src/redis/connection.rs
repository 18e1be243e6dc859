use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use summary_core::config::RedisConfig;
use summary_core::{SchedulerError, SchedulerResult};
use tokio::time::timeout;
use tracing::{debug, error, info};

pub(crate) fn store_error(operation: &str, err: RedisError) -> SchedulerError {
    SchedulerError::Store(format!("Redis {operation} failed: {err}"))
}

/// 共享的Redis连接
///
/// 内部的 `ConnectionManager` 会在断线后自动重连，可以廉价地克隆给各组件使用。
#[derive(Clone)]
pub struct RedisConnection {
    client: Client,
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisConnection {
    /// 建立连接并PING一次；启动时连接失败是致命错误
    pub async fn connect(config: &RedisConfig) -> SchedulerResult<Self> {
        info!("Connecting to Redis at {}", config.url);

        let client = Client::open(config.url.as_str()).map_err(|e| {
            SchedulerError::Configuration(format!("Failed to create Redis client: {e}"))
        })?;

        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        let manager = timeout(connect_timeout, client.get_connection_manager())
            .await
            .map_err(|_| {
                SchedulerError::Store(format!(
                    "Timed out connecting to Redis after {connect_timeout:?}"
                ))
            })?
            .map_err(|e| store_error("connect", e))?;

        let connection = Self {
            client,
            manager,
            key_prefix: config.key_prefix.clone(),
        };
        connection.ping().await?;
        debug!("Successfully connected to Redis");

        Ok(connection)
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 带命名空间前缀的键，例如 `diary:lock:summary:daily:1:2024-01-01`
    pub fn namespaced(&self, namespace: &str, key: &str) -> String {
        if self.key_prefix.is_empty() {
            format!("{namespace}:{key}")
        } else {
            format!("{}:{namespace}:{key}", self.key_prefix)
        }
    }

    pub async fn ping(&self) -> SchedulerResult<()> {
        let mut conn = self.manager();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("PING", e))?;
        if response != "PONG" {
            let error_msg = format!("Unexpected PING response: {response}");
            error!("{}", error_msg);
            return Err(SchedulerError::Store(error_msg));
        }
        Ok(())
    }
}
