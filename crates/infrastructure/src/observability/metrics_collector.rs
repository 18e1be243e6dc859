//! Metrics collector for summary scheduling and dispatching
//!
//! 基于 `metrics` crate 的门面；未安装导出器时所有记录都是空操作。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};

use metrics::{counter, gauge, histogram, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use summary_core::{SchedulerError, SchedulerResult, SummaryKind};
use tracing::info;

/// 安装Prometheus导出器，在 `addr` 上提供 `/metrics`
pub fn init_metrics(addr: SocketAddr) -> SchedulerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| SchedulerError::Configuration(format!("Failed to install Prometheus exporter: {e}")))?;
    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}

/// Dispatcher对单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    SkippedLocked,
    NoContent,
    Ignored,
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::SkippedLocked => "skipped_locked",
            JobOutcome::NoContent => "no_content",
            JobOutcome::Ignored => "ignored",
            JobOutcome::Failed => "failed",
        }
    }
}

pub struct MetricsCollector {
    in_flight: AtomicI64,
    jobs_in_flight: Gauge,
    generation_duration: Histogram,
    tick_duration: Histogram,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicI64::new(0),
            jobs_in_flight: gauge!("summary_dispatcher_jobs_in_flight"),
            generation_duration: histogram!("summary_generation_duration_seconds"),
            tick_duration: histogram!("summary_scheduler_tick_duration_seconds"),
        }
    }

    // Scheduler metrics

    pub fn record_tick(&self, kind: SummaryKind, duration_seconds: f64, published: usize) {
        self.tick_duration.record(duration_seconds);
        counter!("summary_scheduler_ticks_total", "kind" => kind.as_str()).increment(1);
        counter!("summary_messages_published_total", "kind" => kind.as_str())
            .increment(published as u64);
    }

    pub fn record_scan_failure(&self, kind: SummaryKind, stage: &'static str) {
        counter!("summary_scheduler_failures_total", "kind" => kind.as_str(), "stage" => stage)
            .increment(1);
    }

    // Dispatcher metrics

    pub fn record_job(&self, outcome: JobOutcome) {
        counter!("summary_dispatcher_jobs_total", "outcome" => outcome.as_str()).increment(1);
    }

    /// 标记一条消息开始处理；返回的守卫被丢弃时（包括处理过程panic）计数减一
    pub fn track_job(&self) -> InFlightJob<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs_in_flight.set(current as f64);
        InFlightJob { metrics: self }
    }

    pub fn jobs_in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn record_generation(&self, duration_seconds: f64) {
        self.generation_duration.record(duration_seconds);
    }

    pub fn record_lock_lost(&self) {
        counter!("summary_dispatcher_lock_lost_total").increment(1);
    }
}

/// 进行中消息的计数守卫
pub struct InFlightJob<'a> {
    metrics: &'a MetricsCollector,
}

impl Drop for InFlightJob<'_> {
    fn drop(&mut self) {
        let current = self.metrics.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.metrics.jobs_in_flight.set(current as f64);
    }
}
