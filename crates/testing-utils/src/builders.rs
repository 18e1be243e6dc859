//! Test data builders

use chrono::NaiveDate;
use summary_core::{SummaryPeriod, WorkMessage, WorkUnit};

/// Builder for [`WorkMessage`] payloads
///
/// Defaults to a daily summary for user 1 on 2024-01-15.
#[derive(Debug, Clone)]
pub struct WorkMessageBuilder {
    user_id: i64,
    period: SummaryPeriod,
}

impl Default for WorkMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkMessageBuilder {
    pub fn new() -> Self {
        Self {
            user_id: 1,
            period: SummaryPeriod::daily(date(2024, 1, 15)),
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn daily(mut self, year: i32, month: u32, day: u32) -> Self {
        self.period = SummaryPeriod::daily(date(year, month, day));
        self
    }

    pub fn monthly(mut self, year: i32, month: u32) -> Self {
        self.period = SummaryPeriod::monthly(year, month);
        self
    }

    pub fn unit(&self) -> WorkUnit {
        WorkUnit::new(self.user_id, self.period)
    }

    pub fn build(&self) -> WorkMessage {
        WorkMessage::from_unit(&self.unit())
    }

    /// Encoded UTF-8 JSON bytes as they travel over the channel
    pub fn payload(&self) -> Vec<u8> {
        self.build()
            .encode()
            .expect("work message should encode")
            .into_bytes()
    }
}

/// Shorthand for a valid calendar date in tests
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}
