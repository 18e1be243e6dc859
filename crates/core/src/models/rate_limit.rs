use std::time::Duration;

/// 滑动窗口限流的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// 最早一条记录滑出窗口前的剩余时间；允许时为0
    pub reset_in: Duration,
}

impl RateLimitDecision {
    pub fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_in: Duration::ZERO,
        }
    }

    pub fn denied(reset_in: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_in,
        }
    }
}
