use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use summary_core::config::{AppConfig, StoreBackend};
use summary_core::{
    DistributedLock, LoginAttemptLimiter, MessageChannel, RateLimiter, SummaryGenerator,
    SummaryRepository,
};
use summary_infrastructure::{
    connect_pool, init_metrics, HttpSummaryGenerator, InMemoryChannel, InMemoryLock,
    InMemoryRateLimiter, MetricsCollector, PostgresSummaryRepository, RedisConnection, RedisLock,
    RedisPubSubChannel, RedisRateLimiter,
};
use summary_scheduler::SummaryScheduler;
use summary_worker::{DispatcherSettings, SummaryDispatcher};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::shutdown::ShutdownManager;

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 仅运行周期扫描
    Scheduler,
    /// 仅消费工作消息
    Dispatcher,
    /// 运行所有组件
    All,
}

impl AppMode {
    fn runs_scheduler(&self) -> bool {
        matches!(self, AppMode::Scheduler | AppMode::All)
    }

    fn runs_dispatcher(&self) -> bool {
        matches!(self, AppMode::Dispatcher | AppMode::All)
    }
}

/// 应用依赖的外部协作方
pub struct Components {
    pub lock: Arc<dyn DistributedLock>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub channel: Arc<dyn MessageChannel>,
    pub repository: Arc<dyn SummaryRepository>,
    pub generator: Arc<dyn SummaryGenerator>,
}

impl Components {
    /// 按配置连接存储；启动时连接失败是致命错误
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let (lock, rate_limiter, channel): (
            Arc<dyn DistributedLock>,
            Arc<dyn RateLimiter>,
            Arc<dyn MessageChannel>,
        ) = match config.store.backend {
            StoreBackend::Redis => {
                let connection = RedisConnection::connect(&config.redis)
                    .await
                    .context("连接Redis失败")?;
                (
                    Arc::new(RedisLock::new(connection.clone())),
                    Arc::new(RedisRateLimiter::new(connection.clone())),
                    Arc::new(RedisPubSubChannel::new(connection)),
                )
            }
            StoreBackend::Memory => {
                warn!("使用进程内存储后端，锁和通道只在当前进程内有效");
                (
                    Arc::new(InMemoryLock::new()),
                    Arc::new(InMemoryRateLimiter::new()),
                    Arc::new(InMemoryChannel::new()),
                )
            }
        };

        let pool = connect_pool(&config.database)
            .await
            .context("连接数据库失败")?;
        let generator =
            HttpSummaryGenerator::new(config.generation.clone()).context("创建生成服务客户端失败")?;

        Ok(Self {
            lock,
            rate_limiter,
            channel,
            repository: Arc::new(PostgresSummaryRepository::new(pool)),
            generator: Arc::new(generator),
        })
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    instance_id: String,
    scheduler: Option<Arc<SummaryScheduler>>,
    dispatcher: Option<Arc<SummaryDispatcher>>,
    login_limiter: LoginAttemptLimiter,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_bind_address
                .parse()
                .context("解析指标监听地址失败")?;
            init_metrics(addr)?;
        }

        let components = Components::connect(&config).await?;
        Self::with_components(config, mode, components)
    }

    /// 用给定的协作方组装应用
    pub fn with_components(config: AppConfig, mode: AppMode, components: Components) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new());

        let scheduler = (mode.runs_scheduler() && config.scheduler.enabled).then(|| {
            Arc::new(SummaryScheduler::new(
                Arc::clone(&components.repository),
                Arc::clone(&components.channel),
                config.scheduler.channel.clone(),
                Arc::clone(&metrics),
            ))
        });

        let dispatcher = if mode.runs_dispatcher() && config.dispatcher.enabled {
            let settings = DispatcherSettings::from_config(&config.dispatcher)?;
            Some(Arc::new(SummaryDispatcher::new(
                Arc::clone(&components.lock),
                Arc::clone(&components.channel),
                Arc::clone(&components.generator),
                Arc::clone(&components.repository),
                settings,
                Arc::clone(&metrics),
            )))
        } else {
            None
        };

        let login_limiter = LoginAttemptLimiter::new(
            Arc::clone(&components.rate_limiter),
            config.login_limit.max_attempts,
            Duration::from_secs(config.login_limit.window_seconds),
        )?;

        Ok(Self {
            config,
            mode,
            instance_id: instance_id(),
            scheduler,
            dispatcher,
            login_limiter,
        })
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn scheduler(&self) -> Option<&Arc<SummaryScheduler>> {
        self.scheduler.as_ref()
    }

    pub fn dispatcher(&self) -> Option<&Arc<SummaryDispatcher>> {
        self.dispatcher.as_ref()
    }

    /// 供认证层复用的登录失败限流
    pub fn login_limiter(&self) -> &LoginAttemptLimiter {
        &self.login_limiter
    }

    /// 启动所有启用的组件，直到它们全部在关闭信号后退出
    pub async fn run(&self, shutdown: &ShutdownManager) -> Result<()> {
        info!(instance_id = %self.instance_id, "启动应用组件");
        let mut tasks = JoinSet::new();

        if let Some(scheduler) = &self.scheduler {
            for job in self.config.scheduled_jobs()? {
                info!(job = job.name(), "启动周期任务");
                tasks.spawn(Arc::clone(scheduler).run_job(job, shutdown.subscribe().await));
            }
        }

        if let Some(dispatcher) = &self.dispatcher {
            info!(
                channel = dispatcher.settings().channel(),
                max_concurrent_jobs = dispatcher.settings().max_concurrent_jobs(),
                "启动Dispatcher"
            );
            tasks.spawn(Arc::clone(dispatcher).run(shutdown.subscribe().await));
        }

        if tasks.is_empty() {
            warn!("当前模式下没有启用任何组件，请检查配置");
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("组件任务异常退出: {e}");
            }
        }

        info!("所有组件已停止");
        Ok(())
    }
}

fn instance_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{host}-{}", std::process::id())
}
