use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use summary_core::{
    DistributedLock, LockLease, MessageChannel, SchedulerResult, SummaryGenerator,
    SummaryRepository, WorkMessage, WorkUnit,
};
use summary_infrastructure::{JobOutcome, MetricsCollector, StructuredLogger};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::settings::DispatcherSettings;

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 生成并保存了摘要
    Completed,
    /// 锁被他人持有，同一工作单元正在别处处理
    Skipped,
    /// 无法识别的消息类型
    Ignored,
    /// 工作单元已没有源内容
    NoContent,
}

impl From<ProcessOutcome> for JobOutcome {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::Completed => JobOutcome::Completed,
            ProcessOutcome::Skipped => JobOutcome::SkippedLocked,
            ProcessOutcome::Ignored => JobOutcome::Ignored,
            ProcessOutcome::NoContent => JobOutcome::NoContent,
        }
    }
}

/// 工作消息的订阅者
///
/// 通道投递是至少一次的，多个实例会收到同一条消息；以工作单元的自然键加锁，
/// 拿不到锁的一方直接跳过。同时处理的消息数不超过 `max_concurrent_jobs`，
/// 饱和时停止从订阅流读取，消息在通道侧排队。
pub struct SummaryDispatcher {
    lock: Arc<dyn DistributedLock>,
    channel: Arc<dyn MessageChannel>,
    generator: Arc<dyn SummaryGenerator>,
    repository: Arc<dyn SummaryRepository>,
    settings: DispatcherSettings,
    permits: Arc<Semaphore>,
    metrics: Arc<MetricsCollector>,
}

impl SummaryDispatcher {
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        channel: Arc<dyn MessageChannel>,
        generator: Arc<dyn SummaryGenerator>,
        repository: Arc<dyn SummaryRepository>,
        settings: DispatcherSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs()));
        Self {
            lock,
            channel,
            generator,
            repository,
            settings,
            permits,
            metrics,
        }
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// 订阅并处理消息直到收到关闭信号
    ///
    /// 订阅断开后等待 `resubscribe_delay` 重新订阅。关闭时不再读取新消息，
    /// 等待已经开始的处理全部完成后返回。
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let channel = self.settings.channel().to_string();
        let mut in_flight: JoinSet<()> = JoinSet::new();

        'subscription: loop {
            let mut stream = match self.channel.subscribe(&channel).await {
                Ok(stream) => {
                    info!(channel = %channel, "已订阅工作消息通道");
                    stream
                }
                Err(e) => {
                    StructuredLogger::log_system_error("dispatcher", "subscribe", &e);
                    if self.wait_before_resubscribe(&mut shutdown_rx).await {
                        break 'subscription;
                    }
                    continue 'subscription;
                }
            };

            loop {
                while let Some(result) = in_flight.try_join_next() {
                    Self::log_join_result(result);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break 'subscription,
                    next = stream.next() => {
                        let Some(payload) = next else {
                            warn!(channel = %channel, "订阅已断开，稍后重新订阅");
                            if self.wait_before_resubscribe(&mut shutdown_rx).await {
                                break 'subscription;
                            }
                            continue 'subscription;
                        };

                        let permit = tokio::select! {
                            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                                Ok(permit) => permit,
                                Err(_) => break 'subscription,
                            },
                            _ = shutdown_rx.recv() => {
                                // 已读取但未开始处理的消息会在下次扫描时重新发布
                                debug!("关闭时丢弃一条尚未开始处理的消息");
                                break 'subscription;
                            }
                        };

                        let dispatcher = Arc::clone(&self);
                        in_flight.spawn(async move {
                            let _permit = permit;
                            dispatcher.process(payload).await;
                        });
                    }
                }
            }
        }

        info!(in_flight = in_flight.len(), "停止接收消息，等待进行中的任务完成");
        while let Some(result) = in_flight.join_next().await {
            Self::log_join_result(result);
        }
        info!("Dispatcher已停止");
    }

    /// 返回 true 表示等待期间收到了关闭信号
    async fn wait_before_resubscribe(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.resubscribe_delay()) => false,
            _ = shutdown_rx.recv() => true,
        }
    }

    fn log_join_result(result: Result<(), JoinError>) {
        if let Err(e) = result {
            error!(error = %e, "消息处理任务异常退出");
        }
    }

    async fn process(&self, payload: Vec<u8>) {
        let result = {
            let _in_flight = self.metrics.track_job();
            self.handle_payload(&payload).await
        };

        match result {
            Ok(outcome) => self.metrics.record_job(outcome.into()),
            Err(_) => self.metrics.record_job(JobOutcome::Failed),
        }
    }

    /// 处理一条原始负载
    ///
    /// 无法解码的负载返回错误，不重试；无法识别的类型视为成功的空操作。
    pub async fn handle_payload(&self, payload: &[u8]) -> SchedulerResult<ProcessOutcome> {
        let message = WorkMessage::decode(payload).inspect_err(|e| {
            warn!(error = %e, bytes = payload.len(), "丢弃无法解码的消息");
        })?;

        match message.work_unit() {
            Some(unit) => self.handle_unit(unit).await,
            None => {
                debug!(message_type = message.type_name(), "忽略无法识别的消息类型");
                Ok(ProcessOutcome::Ignored)
            }
        }
    }

    /// 在锁保护下处理一个工作单元
    ///
    /// 无论生成或保存是否成功都会释放锁；无法确定锁状态时按未获取处理。
    pub async fn handle_unit(&self, unit: WorkUnit) -> SchedulerResult<ProcessOutcome> {
        let key = unit.lock_key();
        let lease = match self
            .lock
            .try_acquire(&key, self.settings.lock_ttl())
            .await
            .inspect_err(|e| StructuredLogger::log_work_failed(&key, e))?
        {
            Some(lease) => lease,
            None => {
                StructuredLogger::log_work_skipped_locked(&key);
                return Ok(ProcessOutcome::Skipped);
            }
        };

        let result = self.generate_and_save(&unit, &lease).await;

        match self.lock.release(&key, &lease.owner).await {
            Ok(true) => {}
            Ok(false) => {
                self.metrics.record_lock_lost();
                warn!(lock_key = %key, "释放时锁已过期或被他人持有");
            }
            Err(e) => StructuredLogger::log_lock_release_failed(&key, &e),
        }

        if let Err(e) = &result {
            StructuredLogger::log_work_failed(&key, e);
        }
        result
    }

    async fn generate_and_save(
        &self,
        unit: &WorkUnit,
        lease: &LockLease,
    ) -> SchedulerResult<ProcessOutcome> {
        let Some(content) = self.repository.load_source_content(unit).await? else {
            info!(user_id = unit.user_id, period = %unit.period, "工作单元没有源内容，跳过生成");
            return Ok(ProcessOutcome::NoContent);
        };

        let started = Instant::now();
        let summary = self.generate_with_heartbeat(&content, lease).await?;
        self.metrics.record_generation(started.elapsed().as_secs_f64());

        self.repository.save_summary(unit, &summary).await?;
        StructuredLogger::log_work_completed(unit, started.elapsed());
        Ok(ProcessOutcome::Completed)
    }

    /// 调用生成服务；启用续期时在等待期间周期性延长锁
    ///
    /// 续期失败只记录日志，不中断进行中的生成。
    async fn generate_with_heartbeat(&self, content: &str, lease: &LockLease) -> SchedulerResult<String> {
        let Some(period) = self.settings.lock_heartbeat() else {
            return self.generator.generate(content).await;
        };

        let generation = self.generator.generate(content);
        tokio::pin!(generation);
        let mut heartbeat = interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = &mut generation => return result,
                _ = heartbeat.tick() => {
                    match self.lock.extend(&lease.key, &lease.owner, lease.ttl).await {
                        Ok(true) => debug!(lock_key = %lease.key, "锁已续期"),
                        Ok(false) => {
                            self.metrics.record_lock_lost();
                            warn!(lock_key = %lease.key, "锁租约已丢失，继续完成当前生成");
                        }
                        Err(e) => warn!(lock_key = %lease.key, error = %e, "锁续期失败"),
                    }
                }
            }
        }
    }
}
