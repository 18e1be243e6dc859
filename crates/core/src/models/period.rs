use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// 摘要任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Daily,
    Monthly,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Daily => "daily",
            SummaryKind::Monthly => "monthly",
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 摘要覆盖的日历周期
///
/// 同一类型的周期之间可比较大小，日周期与月周期之间不可比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryPeriod {
    Daily { date: NaiveDate },
    Monthly { year: i32, month: u32 },
}

impl SummaryPeriod {
    pub fn daily(date: NaiveDate) -> Self {
        SummaryPeriod::Daily { date }
    }

    pub fn monthly(year: i32, month: u32) -> Self {
        SummaryPeriod::Monthly { year, month }
    }

    /// `today` 所在的（尚未结束的）周期
    pub fn current(kind: SummaryKind, today: NaiveDate) -> Self {
        match kind {
            SummaryKind::Daily => SummaryPeriod::daily(today),
            SummaryKind::Monthly => SummaryPeriod::monthly(today.year(), today.month()),
        }
    }

    pub fn kind(&self) -> SummaryKind {
        match self {
            SummaryPeriod::Daily { .. } => SummaryKind::Daily,
            SummaryPeriod::Monthly { .. } => SummaryKind::Monthly,
        }
    }

    /// 周期是否严格早于 `other`；类型不同时返回 false
    pub fn is_before(&self, other: &SummaryPeriod) -> bool {
        match (self, other) {
            (SummaryPeriod::Daily { date: a }, SummaryPeriod::Daily { date: b }) => a < b,
            (
                SummaryPeriod::Monthly { year: ay, month: am },
                SummaryPeriod::Monthly { year: by, month: bm },
            ) => (ay, am) < (by, bm),
            _ => false,
        }
    }

    /// 周期包含的日期范围 `[start, end)`
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            SummaryPeriod::Daily { date } => Some((date, date.succ_opt()?)),
            SummaryPeriod::Monthly { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1)?;
                let end = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                Some((start, end))
            }
        }
    }
}

impl fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryPeriod::Daily { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            SummaryPeriod::Monthly { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

/// 一个工作单元：某个用户的某个周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    pub user_id: i64,
    pub period: SummaryPeriod,
}

impl WorkUnit {
    pub fn new(user_id: i64, period: SummaryPeriod) -> Self {
        Self { user_id, period }
    }

    /// 工作单元的自然锁键，例如 `summary:daily:42:2024-01-15`
    pub fn lock_key(&self) -> String {
        format!(
            "summary:{}:{}:{}",
            self.period.kind(),
            self.user_id,
            self.period
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_current_period() {
        let today = date(2024, 3, 15);
        assert_eq!(
            SummaryPeriod::current(SummaryKind::Daily, today),
            SummaryPeriod::daily(today)
        );
        assert_eq!(
            SummaryPeriod::current(SummaryKind::Monthly, today),
            SummaryPeriod::monthly(2024, 3)
        );
    }

    #[test]
    fn test_is_before() {
        assert!(SummaryPeriod::daily(date(2024, 3, 14)).is_before(&SummaryPeriod::daily(date(2024, 3, 15))));
        assert!(!SummaryPeriod::daily(date(2024, 3, 15)).is_before(&SummaryPeriod::daily(date(2024, 3, 15))));
        assert!(SummaryPeriod::monthly(2023, 12).is_before(&SummaryPeriod::monthly(2024, 1)));
        assert!(!SummaryPeriod::monthly(2024, 2).is_before(&SummaryPeriod::monthly(2024, 1)));
        assert!(!SummaryPeriod::monthly(2023, 1).is_before(&SummaryPeriod::daily(date(2024, 1, 1))));
    }

    #[test]
    fn test_date_range_wraps_december() {
        let (start, end) = SummaryPeriod::monthly(2023, 12).date_range().unwrap();
        assert_eq!(start, date(2023, 12, 1));
        assert_eq!(end, date(2024, 1, 1));
    }

    #[test]
    fn test_lock_keys() {
        let daily = WorkUnit::new(42, SummaryPeriod::daily(date(2024, 1, 5)));
        assert_eq!(daily.lock_key(), "summary:daily:42:2024-01-05");

        let monthly = WorkUnit::new(7, SummaryPeriod::monthly(2024, 2));
        assert_eq!(monthly.lock_key(), "summary:monthly:7:2024-02");
    }
}
