use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::period::SummaryKind;
use crate::{SchedulerError, SchedulerResult};

/// 周期性任务描述
///
/// 在进程启动时创建，之后不可变；每个描述驱动一个独立的定时任务。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJobDescriptor {
    name: String,
    kind: SummaryKind,
    interval: Duration,
}

impl ScheduledJobDescriptor {
    pub fn new(name: impl Into<String>, kind: SummaryKind, interval: Duration) -> SchedulerResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchedulerError::Configuration(
                "任务名称不能为空".to_string(),
            ));
        }
        if interval.is_zero() {
            return Err(SchedulerError::Configuration(format!(
                "任务 {name} 的执行间隔必须大于0"
            )));
        }
        Ok(Self {
            name,
            kind,
            interval,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SummaryKind {
        self.kind
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// 周期任务的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        let err = ScheduledJobDescriptor::new("daily", SummaryKind::Daily, Duration::ZERO).unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(ScheduledJobDescriptor::new(" ", SummaryKind::Daily, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_descriptor_accessors() {
        let job = ScheduledJobDescriptor::new("monthly", SummaryKind::Monthly, Duration::from_secs(3600)).unwrap();
        assert_eq!(job.name(), "monthly");
        assert_eq!(job.kind(), SummaryKind::Monthly);
        assert_eq!(job.interval(), Duration::from_secs(3600));
    }
}
