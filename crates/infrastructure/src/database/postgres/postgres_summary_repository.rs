use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use summary_core::{
    SchedulerError, SchedulerResult, SummaryKind, SummaryPeriod, SummaryRepository, WorkUnit,
};
use tracing::debug;

/// PostgreSQL摘要仓储实现
///
/// 缺失摘要的查询只读；写入按单个工作单元upsert，不需要跨单元事务。
pub struct PostgresSummaryRepository {
    pool: PgPool,
}

impl PostgresSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn period_bounds(period: &SummaryPeriod) -> SchedulerResult<(NaiveDate, NaiveDate)> {
        period.date_range().ok_or_else(|| {
            SchedulerError::InvalidArgument(format!("无效的摘要周期: {period:?}"))
        })
    }

    fn month_from_db(value: i32) -> SchedulerResult<u32> {
        u32::try_from(value)
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| SchedulerError::Internal(format!("数据库返回了无效的月份: {value}")))
    }
}

#[async_trait]
impl SummaryRepository for PostgresSummaryRepository {
    async fn list_opted_in_users(&self, kind: SummaryKind) -> SchedulerResult<Vec<i64>> {
        let sql = match kind {
            SummaryKind::Daily => "SELECT id FROM users WHERE auto_daily_summary = TRUE ORDER BY id",
            SummaryKind::Monthly => {
                "SELECT id FROM users WHERE auto_monthly_summary = TRUE ORDER BY id"
            }
        };

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(SchedulerError::Database)?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("id").map_err(SchedulerError::Database))
            .collect()
    }

    async fn find_missing_periods(
        &self,
        user_id: i64,
        kind: SummaryKind,
        current: SummaryPeriod,
    ) -> SchedulerResult<Vec<SummaryPeriod>> {
        // 当前周期的起始日期之前的内容才算完整
        let (cutoff, _) = Self::period_bounds(&current)?;

        let periods = match kind {
            SummaryKind::Daily => {
                let rows = sqlx::query(
                    r#"
                    SELECT DISTINCT d.entry_date
                    FROM diaries d
                    WHERE d.user_id = $1
                      AND d.entry_date < $2
                      AND NOT EXISTS (
                          SELECT 1 FROM daily_summaries s
                          WHERE s.user_id = d.user_id AND s.summary_date = d.entry_date
                      )
                    ORDER BY d.entry_date
                    "#,
                )
                .bind(user_id)
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await
                .map_err(SchedulerError::Database)?;

                rows.iter()
                    .map(|row| {
                        row.try_get::<NaiveDate, _>("entry_date")
                            .map(SummaryPeriod::daily)
                            .map_err(SchedulerError::Database)
                    })
                    .collect::<SchedulerResult<Vec<_>>>()?
            }
            SummaryKind::Monthly => {
                let rows = sqlx::query(
                    r#"
                    SELECT DISTINCT
                        EXTRACT(YEAR FROM d.entry_date)::INT AS year,
                        EXTRACT(MONTH FROM d.entry_date)::INT AS month
                    FROM diaries d
                    WHERE d.user_id = $1
                      AND d.entry_date < $2
                      AND NOT EXISTS (
                          SELECT 1 FROM monthly_summaries s
                          WHERE s.user_id = d.user_id
                            AND s.year = EXTRACT(YEAR FROM d.entry_date)::INT
                            AND s.month = EXTRACT(MONTH FROM d.entry_date)::INT
                      )
                    ORDER BY year, month
                    "#,
                )
                .bind(user_id)
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await
                .map_err(SchedulerError::Database)?;

                rows.iter()
                    .map(|row| -> SchedulerResult<SummaryPeriod> {
                        let year: i32 = row.try_get("year")?;
                        let month: i32 = row.try_get("month")?;
                        Ok(SummaryPeriod::monthly(year, Self::month_from_db(month)?))
                    })
                    .collect::<SchedulerResult<Vec<_>>>()?
            }
        };

        debug!(user_id, kind = %kind, count = periods.len(), "查询缺失摘要的周期");
        Ok(periods)
    }

    async fn load_source_content(&self, unit: &WorkUnit) -> SchedulerResult<Option<String>> {
        let (start, end) = Self::period_bounds(&unit.period)?;
        let rows = sqlx::query(
            r#"
            SELECT entry_date, content
            FROM diaries
            WHERE user_id = $1 AND entry_date >= $2 AND entry_date < $3
            ORDER BY entry_date, id
            "#,
        )
        .bind(unit.user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(SchedulerError::Database)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut sections = Vec::with_capacity(rows.len());
        for row in &rows {
            let date: NaiveDate = row.try_get("entry_date")?;
            let content: String = row.try_get("content")?;
            sections.push(format!("[{}]\n{}", date.format("%Y-%m-%d"), content.trim()));
        }
        Ok(Some(sections.join("\n\n")))
    }

    async fn save_summary(&self, unit: &WorkUnit, content: &str) -> SchedulerResult<()> {
        match unit.period {
            SummaryPeriod::Daily { date } => {
                sqlx::query(
                    r#"
                    INSERT INTO daily_summaries (user_id, summary_date, content)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id, summary_date) DO UPDATE SET
                        content = EXCLUDED.content,
                        updated_at = NOW()
                    "#,
                )
                .bind(unit.user_id)
                .bind(date)
                .bind(content)
                .execute(&self.pool)
                .await
                .map_err(SchedulerError::Database)?;
            }
            SummaryPeriod::Monthly { year, month } => {
                let month = i32::try_from(month).map_err(|_| {
                    SchedulerError::InvalidArgument(format!("无效的月份: {month}"))
                })?;
                sqlx::query(
                    r#"
                    INSERT INTO monthly_summaries (user_id, year, month, content)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id, year, month) DO UPDATE SET
                        content = EXCLUDED.content,
                        updated_at = NOW()
                    "#,
                )
                .bind(unit.user_id)
                .bind(year)
                .bind(month)
                .bind(content)
                .execute(&self.pool)
                .await
                .map_err(SchedulerError::Database)?;
            }
        }

        debug!(user_id = unit.user_id, period = %unit.period, "摘要已保存");
        Ok(())
    }
}
