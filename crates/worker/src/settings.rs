use std::time::Duration;

use summary_core::config::DispatcherConfig;
use summary_core::{SchedulerError, SchedulerResult};

/// Dispatcher运行参数，构造时校验
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    channel: String,
    max_concurrent_jobs: usize,
    lock_ttl: Duration,
    lock_heartbeat: Option<Duration>,
    resubscribe_delay: Duration,
}

impl DispatcherSettings {
    pub fn new(channel: impl Into<String>, max_concurrent_jobs: usize) -> SchedulerResult<Self> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(SchedulerError::Configuration("订阅通道名称不能为空".to_string()));
        }
        if max_concurrent_jobs == 0 {
            return Err(SchedulerError::Configuration(
                "max_concurrent_jobs 必须大于0".to_string(),
            ));
        }
        Ok(Self {
            channel,
            max_concurrent_jobs,
            lock_ttl: Duration::from_secs(600),
            lock_heartbeat: None,
            resubscribe_delay: Duration::from_secs(5),
        })
    }

    pub fn from_config(config: &DispatcherConfig) -> SchedulerResult<Self> {
        Self::new(config.channel.clone(), config.max_concurrent_jobs)?
            .with_lock_ttl(config.lock_ttl())?
            .with_lock_heartbeat(config.lock_heartbeat())?
            .with_resubscribe_delay(config.resubscribe_delay())
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> SchedulerResult<Self> {
        if ttl.as_millis() == 0 {
            return Err(SchedulerError::Configuration("锁TTL必须大于0".to_string()));
        }
        self.lock_ttl = ttl;
        self.check_heartbeat()?;
        Ok(self)
    }

    /// 生成期间按此周期续期锁；None 表示不续期
    pub fn with_lock_heartbeat(mut self, heartbeat: Option<Duration>) -> SchedulerResult<Self> {
        self.lock_heartbeat = heartbeat.filter(|period| !period.is_zero());
        self.check_heartbeat()?;
        Ok(self)
    }

    pub fn with_resubscribe_delay(mut self, delay: Duration) -> SchedulerResult<Self> {
        if delay.is_zero() {
            return Err(SchedulerError::Configuration("重新订阅间隔必须大于0".to_string()));
        }
        self.resubscribe_delay = delay;
        Ok(self)
    }

    fn check_heartbeat(&self) -> SchedulerResult<()> {
        match self.lock_heartbeat {
            Some(period) if period >= self.lock_ttl => Err(SchedulerError::Configuration(format!(
                "锁续期周期 {period:?} 必须小于锁TTL {:?}",
                self.lock_ttl
            ))),
            _ => Ok(()),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    pub fn lock_heartbeat(&self) -> Option<Duration> {
        self.lock_heartbeat
    }

    pub fn resubscribe_delay(&self) -> Duration {
        self.resubscribe_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = DispatcherSettings::new("jobs", 0).unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }

    #[test]
    fn test_heartbeat_must_be_shorter_than_ttl() {
        let settings = DispatcherSettings::new("jobs", 1)
            .unwrap()
            .with_lock_ttl(Duration::from_secs(10))
            .unwrap();
        assert!(settings
            .clone()
            .with_lock_heartbeat(Some(Duration::from_secs(10)))
            .is_err());
        let settings = settings
            .with_lock_heartbeat(Some(Duration::from_secs(3)))
            .unwrap();
        assert_eq!(settings.lock_heartbeat(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_heartbeat_means_disabled() {
        let settings = DispatcherSettings::new("jobs", 1)
            .unwrap()
            .with_lock_heartbeat(Some(Duration::ZERO))
            .unwrap();
        assert_eq!(settings.lock_heartbeat(), None);
    }

    #[test]
    fn test_from_default_config() {
        let settings = DispatcherSettings::from_config(&DispatcherConfig::default()).unwrap();
        assert_eq!(settings.channel(), "summary_jobs");
        assert_eq!(settings.max_concurrent_jobs(), 4);
        assert_eq!(settings.lock_ttl(), Duration::from_secs(600));
        assert_eq!(settings.lock_heartbeat(), None);
    }
}
