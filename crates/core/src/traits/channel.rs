use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::SchedulerResult;

/// 订阅得到的原始负载流；流结束表示订阅已断开
pub type PayloadStream = BoxStream<'static, Vec<u8>>;

/// 发布/订阅通道抽象接口
///
/// 多个订阅者订阅同一通道时，每条消息会被扇出到所有订阅者。
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// 发布一条UTF-8 JSON负载
    async fn publish(&self, channel: &str, payload: &str) -> SchedulerResult<()>;

    /// 订阅通道
    async fn subscribe(&self, channel: &str) -> SchedulerResult<PayloadStream>;
}
