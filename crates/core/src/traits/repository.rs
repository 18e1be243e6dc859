use async_trait::async_trait;

use crate::models::{SummaryKind, SummaryPeriod, WorkUnit};
use crate::SchedulerResult;

/// 关系型存储中本层需要的查询
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// 开启了该类型自动摘要的用户ID
    async fn list_opted_in_users(&self, kind: SummaryKind) -> SchedulerResult<Vec<i64>>;

    /// 有日记内容但没有摘要记录的周期，不包含 `current` 及之后的周期
    async fn find_missing_periods(
        &self,
        user_id: i64,
        kind: SummaryKind,
        current: SummaryPeriod,
    ) -> SchedulerResult<Vec<SummaryPeriod>>;

    /// 加载工作单元的源内容；没有内容时返回 None
    async fn load_source_content(&self, unit: &WorkUnit) -> SchedulerResult<Option<String>>;

    /// 保存生成的摘要（按工作单元覆盖写入）
    async fn save_summary(&self, unit: &WorkUnit, content: &str) -> SchedulerResult<()>;
}
