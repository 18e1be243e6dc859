use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use summary_core::{
    JobState, MessageChannel, ScheduledJobDescriptor, SchedulerResult, SummaryKind,
    SummaryPeriod, SummaryRepository, WorkMessage, WorkUnit,
};
use summary_infrastructure::{MetricsCollector, StructuredLogger};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 单次扫描的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub users_scanned: usize,
    pub published: usize,
    pub failed_users: usize,
    pub failed_publishes: usize,
}

impl TickReport {
    pub fn failures(&self) -> usize {
        self.failed_users + self.failed_publishes
    }
}

/// 摘要任务调度器
///
/// 每个 [`ScheduledJobDescriptor`] 由 [`SummaryScheduler::run_job`] 驱动一个独立的周期任务。
/// 同一任务的两次执行不会重叠：执行在定时循环内串行等待，错过的触发直接跳过。
pub struct SummaryScheduler {
    repository: Arc<dyn SummaryRepository>,
    channel: Arc<dyn MessageChannel>,
    channel_name: String,
    metrics: Arc<MetricsCollector>,
    job_states: RwLock<HashMap<String, JobState>>,
}

impl SummaryScheduler {
    pub fn new(
        repository: Arc<dyn SummaryRepository>,
        channel: Arc<dyn MessageChannel>,
        channel_name: impl Into<String>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            repository,
            channel,
            channel_name: channel_name.into(),
            metrics,
            job_states: RwLock::new(HashMap::new()),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// 任务当前状态；未启动过的任务返回 None
    pub async fn job_state(&self, job_name: &str) -> Option<JobState> {
        self.job_states.read().await.get(job_name).copied()
    }

    async fn set_state(&self, job_name: &str, state: JobState) {
        self.job_states
            .write()
            .await
            .insert(job_name.to_string(), state);
    }

    /// 以本地日期为"今天"执行一次扫描
    pub async fn tick(&self, kind: SummaryKind) -> SchedulerResult<TickReport> {
        self.tick_at(kind, Local::now().date_naive()).await
    }

    /// 执行一次扫描
    ///
    /// 只有列出用户失败时才返回错误；单个用户的查询失败和单条消息的发布失败
    /// 都只记录日志并计入报告，不影响其余用户和周期。
    pub async fn tick_at(&self, kind: SummaryKind, today: NaiveDate) -> SchedulerResult<TickReport> {
        let current = SummaryPeriod::current(kind, today);
        let users = self.repository.list_opted_in_users(kind).await?;
        let mut report = TickReport {
            users_scanned: users.len(),
            ..TickReport::default()
        };
        debug!(kind = %kind, users = users.len(), current = %current, "开始扫描缺失摘要");

        for user_id in users {
            let periods = match self
                .repository
                .find_missing_periods(user_id, kind, current)
                .await
            {
                Ok(periods) => periods,
                Err(e) => {
                    warn!(user_id, kind = %kind, error = %e, "查询用户缺失摘要失败，跳过该用户");
                    self.metrics.record_scan_failure(kind, "query");
                    report.failed_users += 1;
                    continue;
                }
            };

            // 仓储返回的进行中周期不能发布
            for period in periods
                .into_iter()
                .filter(|p| p.kind() == kind && p.is_before(&current))
            {
                let unit = WorkUnit::new(user_id, period);
                match self.publish_unit(&unit).await {
                    Ok(()) => {
                        StructuredLogger::log_work_published(&self.channel_name, &unit);
                        report.published += 1;
                    }
                    Err(e) => {
                        warn!(
                            user_id,
                            period = %unit.period,
                            error = %e,
                            "发布工作消息失败"
                        );
                        self.metrics.record_scan_failure(kind, "publish");
                        report.failed_publishes += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn publish_unit(&self, unit: &WorkUnit) -> SchedulerResult<()> {
        let payload = WorkMessage::from_unit(unit).encode()?;
        self.channel.publish(&self.channel_name, &payload).await
    }

    async fn execute_job(&self, job: &ScheduledJobDescriptor) {
        self.set_state(job.name(), JobState::Running).await;
        let started = std::time::Instant::now();

        match self.tick(job.kind()).await {
            Ok(report) => {
                let elapsed = started.elapsed();
                self.metrics
                    .record_tick(job.kind(), elapsed.as_secs_f64(), report.published);
                StructuredLogger::log_tick_completed(
                    job.name(),
                    job.kind(),
                    report.users_scanned,
                    report.published,
                    report.failures(),
                    elapsed,
                );
            }
            Err(e) => {
                self.metrics.record_scan_failure(job.kind(), "list_users");
                StructuredLogger::log_system_error("scheduler", job.name(), &e);
            }
        }

        self.set_state(job.name(), JobState::Idle).await;
    }

    /// 运行一个周期任务直到收到关闭信号
    ///
    /// 第一次执行发生在启动后一个间隔。收到关闭信号时，正在进行的扫描被放弃。
    pub async fn run_job(
        self: Arc<Self>,
        job: ScheduledJobDescriptor,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(job = job.name(), kind = %job.kind(), interval = ?job.interval(), "周期任务启动");
        self.set_state(job.name(), JobState::Idle).await;

        let mut ticker = interval_at(Instant::now() + job.interval(), job.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.execute_job(&job) => {}
                        _ = shutdown_rx.recv() => {
                            info!(job = job.name(), "收到关闭信号，放弃进行中的扫描");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        self.set_state(job.name(), JobState::Stopped).await;
        info!(job = job.name(), "周期任务已停止");
    }
}
