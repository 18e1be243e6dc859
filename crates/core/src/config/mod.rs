//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值 → TOML配置文件 → `SUMMARY_` 前缀的环境变量
//! （层级分隔符为 `__`，例如 `SUMMARY_DISPATCHER__MAX_CONCURRENT_JOBS=8`）。
//!
//! 所有数值型配置在加载时立即校验，非正数的间隔、上限、TTL和并发数直接拒绝。

pub mod models;
pub mod validation;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub use models::*;
pub use validation::{ConfigValidator, ValidationUtils};

use crate::models::{ScheduledJobDescriptor, SummaryKind};
use crate::SchedulerResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub redis: RedisConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub dispatcher: DispatcherConfig,
    pub generation: GenerationConfig,
    pub login_limit: LoginLimitConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/summary.toml",
                "summary.toml",
                "/etc/summary/config.toml",
            ];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SUMMARY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 每种摘要类型一个周期任务
    pub fn scheduled_jobs(&self) -> SchedulerResult<Vec<ScheduledJobDescriptor>> {
        Ok(vec![
            ScheduledJobDescriptor::new(
                "daily_summary",
                SummaryKind::Daily,
                Duration::from_secs(self.scheduler.daily_interval_seconds),
            )?,
            ScheduledJobDescriptor::new(
                "monthly_summary",
                SummaryKind::Monthly,
                Duration::from_secs(self.scheduler.monthly_interval_seconds),
            )?,
        ])
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> SchedulerResult<()> {
        if self.store.backend == StoreBackend::Redis {
            self.redis.validate()?;
        }
        self.database.validate()?;
        self.scheduler.validate()?;
        self.dispatcher.validate()?;
        self.generation.validate()?;
        self.login_limit.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatcher.lock_heartbeat(), None);
        assert_eq!(config.scheduled_jobs().unwrap().len(), 2);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [dispatcher]
            max_concurrent_jobs = 8
            lock_heartbeat_seconds = 60

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatcher.max_concurrent_jobs, 8);
        assert_eq!(config.dispatcher.lock_heartbeat(), Some(Duration::from_secs(60)));
        assert_eq!(config.dispatcher.lock_ttl_seconds, 600);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = AppConfig::from_toml("[dispatcher]\nmax_concurrent_jobs = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_concurrent_jobs"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(AppConfig::from_toml("[scheduler]\ndaily_interval_seconds = 0\n").is_err());
    }

    #[test]
    fn test_heartbeat_must_be_shorter_than_ttl() {
        let result = AppConfig::from_toml(
            "[dispatcher]\nlock_ttl_seconds = 30\nlock_heartbeat_seconds = 30\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scheduler]\nchannel = \"jobs\"\ndaily_interval_seconds = 60").unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.scheduler.channel, "jobs");
        assert_eq!(config.scheduler.daily_interval_seconds, 60);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/summary.toml")).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.scheduler.channel, config.scheduler.channel);
    }
}
