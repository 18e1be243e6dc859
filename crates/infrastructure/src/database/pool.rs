use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use summary_core::config::DatabaseConfig;
use summary_core::{SchedulerError, SchedulerResult};
use tracing::info;

/// 创建PostgreSQL连接池；启动时连接失败是致命错误
pub async fn connect_pool(config: &DatabaseConfig) -> SchedulerResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(SchedulerError::Database)?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    info!("数据库连接池已创建，最大连接数: {}", config.max_connections);
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> SchedulerResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| SchedulerError::Internal(format!("数据库迁移失败: {e}")))?;
    info!("数据库迁移完成");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> SchedulerResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(SchedulerError::Database)?;
    Ok(())
}
