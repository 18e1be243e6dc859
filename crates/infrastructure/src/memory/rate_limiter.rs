use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use summary_core::models::RateLimitDecision;
use summary_core::traits::{validate_rate_limit, RateLimiter};
use summary_core::SchedulerResult;
use tokio::time::Instant;

use super::lock::poison_err;

/// 过期窗口的清理间隔
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Window {
    entries: VecDeque<Instant>,
    length: Duration,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while self
            .entries
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.length)
        {
            self.entries.pop_front();
        }
    }

    /// 最新一条记录也已滑出窗口，等价于Redis键过期
    fn is_expired(&self, now: Instant) -> bool {
        self.entries
            .back()
            .map_or(true, |newest| now.duration_since(*newest) >= self.length)
    }
}

#[derive(Debug)]
struct Windows {
    by_key: HashMap<String, Window>,
    last_sweep: Instant,
}

impl Windows {
    fn sweep_if_due(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        self.by_key.retain(|_, window| !window.is_expired(now));
        self.last_sweep = now;
    }
}

/// 进程内滑动窗口限流器
///
/// 所有记录都滑出窗口的键会在周期性清理时整体删除。
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    windows: Mutex<Windows>,
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self {
            windows: Mutex::new(Windows {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存了记录的键数量
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.by_key.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn is_allowed(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> SchedulerResult<RateLimitDecision> {
        validate_rate_limit(limit, window)?;
        let now = Instant::now();
        let mut windows = self.windows.lock().map_err(poison_err)?;
        windows.sweep_if_due(now);

        let state = windows
            .by_key
            .entry(key.to_string())
            .or_insert_with(|| Window {
                entries: VecDeque::new(),
                length: window,
            });
        state.length = window;
        state.prune(now);

        let count = state.entries.len() as u32;
        if count < limit {
            state.entries.push_back(now);
            return Ok(RateLimitDecision::allowed(limit - count - 1));
        }

        let reset_in = state
            .entries
            .front()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        Ok(RateLimitDecision::denied(reset_in))
    }

    async fn reset(&self, key: &str) -> SchedulerResult<()> {
        self.windows.lock().map_err(poison_err)?.by_key.remove(key);
        Ok(())
    }
}
