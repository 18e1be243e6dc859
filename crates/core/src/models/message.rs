use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::period::{SummaryPeriod, WorkUnit};
use crate::SchedulerResult;

/// 通道上传输的工作消息
///
/// 以 `type` 字段区分类型。无法识别的类型会被解码为 [`WorkMessage::Unknown`]，
/// 以便旧版本的消费者可以安全地忽略新版本生产者发布的消息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkMessage {
    DailySummary {
        user_id: i64,
        date: NaiveDate,
    },
    MonthlySummary {
        user_id: i64,
        year: i32,
        month: u32,
    },
    #[serde(other)]
    Unknown,
}

impl WorkMessage {
    pub fn daily(user_id: i64, date: NaiveDate) -> Self {
        WorkMessage::DailySummary { user_id, date }
    }

    pub fn monthly(user_id: i64, year: i32, month: u32) -> Self {
        WorkMessage::MonthlySummary {
            user_id,
            year,
            month,
        }
    }

    pub fn from_unit(unit: &WorkUnit) -> Self {
        match unit.period {
            SummaryPeriod::Daily { date } => WorkMessage::daily(unit.user_id, date),
            SummaryPeriod::Monthly { year, month } => {
                WorkMessage::monthly(unit.user_id, year, month)
            }
        }
    }

    /// 消息对应的工作单元，未知类型返回 None
    pub fn work_unit(&self) -> Option<WorkUnit> {
        match *self {
            WorkMessage::DailySummary { user_id, date } => {
                Some(WorkUnit::new(user_id, SummaryPeriod::daily(date)))
            }
            WorkMessage::MonthlySummary {
                user_id,
                year,
                month,
            } => Some(WorkUnit::new(user_id, SummaryPeriod::monthly(year, month))),
            WorkMessage::Unknown => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            WorkMessage::DailySummary { .. } => "daily_summary",
            WorkMessage::MonthlySummary { .. } => "monthly_summary",
            WorkMessage::Unknown => "unknown",
        }
    }

    pub fn encode(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 从UTF-8 JSON负载解码
    pub fn decode(payload: &[u8]) -> SchedulerResult<Self> {
        let text = std::str::from_utf8(payload).map_err(|e| {
            crate::SchedulerError::Serialization(format!("负载不是有效的UTF-8: {e}"))
        })?;
        Ok(serde_json::from_str(text)?)
    }
}
