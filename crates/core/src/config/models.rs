use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigValidator, ValidationUtils};
use crate::{SchedulerError, SchedulerResult};

/// 共享键值存储与通道的后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// 多实例部署：Redis 锁、限流与 Pub/Sub
    Redis,
    /// 单进程部署：进程内实现，语义相同
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// 所有锁与限流键的前缀
    pub key_prefix: String,
    pub connection_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "diary".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

impl ConfigValidator for RedisConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_url(&self.url, "redis.url")?;
        ValidationUtils::validate_seconds(
            self.connection_timeout_seconds,
            "redis.connection_timeout_seconds",
            300,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/diary".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
            run_migrations: true,
        }
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_url(&self.url, "database.url")?;
        ValidationUtils::validate_count(self.max_connections as usize, "database.max_connections", 1000)?;
        if self.min_connections > self.max_connections {
            return Err(SchedulerError::Configuration(
                "database.min_connections cannot exceed database.max_connections".to_string(),
            ));
        }
        ValidationUtils::validate_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
            300,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub channel: String,
    pub daily_interval_seconds: u64,
    pub monthly_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: "summary_jobs".to_string(),
            daily_interval_seconds: 3600,
            monthly_interval_seconds: 6 * 3600,
        }
    }
}

impl ConfigValidator for SchedulerConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_not_empty(&self.channel, "scheduler.channel")?;
        ValidationUtils::validate_seconds(
            self.daily_interval_seconds,
            "scheduler.daily_interval_seconds",
            7 * 24 * 3600,
        )?;
        ValidationUtils::validate_seconds(
            self.monthly_interval_seconds,
            "scheduler.monthly_interval_seconds",
            31 * 24 * 3600,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub enabled: bool,
    pub channel: String,
    pub max_concurrent_jobs: usize,
    /// 应远大于生成耗时的P99
    pub lock_ttl_seconds: u64,
    /// 生成期间续期锁的间隔，0表示不续期
    pub lock_heartbeat_seconds: u64,
    pub resubscribe_delay_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: "summary_jobs".to_string(),
            max_concurrent_jobs: 4,
            lock_ttl_seconds: 600,
            lock_heartbeat_seconds: 0,
            resubscribe_delay_seconds: 5,
        }
    }
}

impl DispatcherConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }

    pub fn lock_heartbeat(&self) -> Option<Duration> {
        (self.lock_heartbeat_seconds > 0).then(|| Duration::from_secs(self.lock_heartbeat_seconds))
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_secs(self.resubscribe_delay_seconds)
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_not_empty(&self.channel, "dispatcher.channel")?;
        ValidationUtils::validate_count(
            self.max_concurrent_jobs,
            "dispatcher.max_concurrent_jobs",
            1000,
        )?;
        ValidationUtils::validate_seconds(self.lock_ttl_seconds, "dispatcher.lock_ttl_seconds", 24 * 3600)?;
        ValidationUtils::validate_seconds(
            self.resubscribe_delay_seconds,
            "dispatcher.resubscribe_delay_seconds",
            300,
        )?;
        if self.lock_heartbeat_seconds >= self.lock_ttl_seconds {
            return Err(SchedulerError::Configuration(
                "dispatcher.lock_heartbeat_seconds must be shorter than dispatcher.lock_ttl_seconds"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI兼容接口的基础地址
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            system_prompt: "Summarize the following diary entries in a warm, concise paragraph."
                .to_string(),
            timeout_seconds: 120,
        }
    }
}

impl ConfigValidator for GenerationConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_url(&self.endpoint, "generation.endpoint")?;
        ValidationUtils::validate_not_empty(&self.model, "generation.model")?;
        ValidationUtils::validate_seconds(self.timeout_seconds, "generation.timeout_seconds", 3600)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginLimitConfig {
    pub max_attempts: u32,
    pub window_seconds: u64,
}

impl Default for LoginLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 15 * 60,
        }
    }
}

impl ConfigValidator for LoginLimitConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_count(self.max_attempts as usize, "login_limit.max_attempts", 1000)?;
        ValidationUtils::validate_seconds(self.window_seconds, "login_limit.window_seconds", 24 * 3600)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_bind_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_bind_address: "0.0.0.0:9100".to_string(),
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> SchedulerResult<()> {
        ValidationUtils::validate_one_of(
            &self.log_level,
            &["trace", "debug", "info", "warn", "error"],
            "observability.log_level",
        )?;
        ValidationUtils::validate_one_of(&self.log_format, &["json", "pretty"], "observability.log_format")?;
        if self.metrics_enabled {
            self.metrics_bind_address
                .parse::<std::net::SocketAddr>()
                .map_err(|e| {
                    SchedulerError::Configuration(format!(
                        "observability.metrics_bind_address is invalid: {e}"
                    ))
                })?;
        }
        Ok(())
    }
}
