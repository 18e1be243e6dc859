use async_trait::async_trait;

use crate::SchedulerResult;

/// 文本生成协作方：把日记内容变成摘要文本
///
/// 调用可能很慢、有成本并且偶尔失败，本层不做重试。
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn generate(&self, content: &str) -> SchedulerResult<String>;
}
