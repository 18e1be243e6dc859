use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use summary_core::config::AppConfig;
use summary_scheduler_app::{AppMode, Application, ShutdownManager};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 等待进行中的摘要生成完成的最长时间
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Scheduler,
    Dispatcher,
    All,
}

impl From<ModeArg> for AppMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Scheduler => AppMode::Scheduler,
            ModeArg::Dispatcher => AppMode::Dispatcher,
            ModeArg::All => AppMode::All,
        }
    }
}

/// 日记摘要后台任务：周期扫描缺失的摘要并以有界并发生成
#[derive(Debug, Parser)]
#[command(name = "summary-scheduler", version)]
struct Cli {
    /// 配置文件路径，缺省时按默认路径查找
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 运行模式
    #[arg(short, long, value_enum, default_value_t = ModeArg::All)]
    mode: ModeArg,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("<默认路径>")
        )
    })?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.observability.log_level.as_str());
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(config.observability.log_format.as_str());
    init_logging(log_level, log_format)?;

    let mode = AppMode::from(cli.mode);
    check_mode(mode, &config)?;
    info!("启动日记摘要调度系统，运行模式: {:?}", mode);

    let app = Arc::new(Application::new(config, mode).await?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_manager = shutdown_manager.clone();
        tokio::spawn(async move {
            if let Err(e) = app.run(&shutdown_manager).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await?;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    Ok(())
}

/// 初始化日志系统；RUST_LOG优先于配置的级别
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}

/// 单组件模式下对应组件必须启用
fn check_mode(mode: AppMode, config: &AppConfig) -> Result<()> {
    match mode {
        AppMode::Scheduler if !config.scheduler.enabled => {
            Err(anyhow::anyhow!("Scheduler模式被禁用，请检查配置"))
        }
        AppMode::Dispatcher if !config.dispatcher.enabled => {
            Err(anyhow::anyhow!("Dispatcher模式被禁用，请检查配置"))
        }
        _ => Ok(()),
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("安装Ctrl+C信号处理器失败")?;
                info!("收到Ctrl+C信号");
            }
            _ = terminate.recv() => info!("收到SIGTERM信号"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("安装Ctrl+C信号处理器失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
