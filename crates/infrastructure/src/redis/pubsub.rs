use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use summary_core::traits::{MessageChannel, PayloadStream};
use summary_core::{SchedulerError, SchedulerResult};
use tracing::{debug, info};

use super::connection::RedisConnection;

/// 基于Redis PUBLISH/SUBSCRIBE的消息通道
///
/// 至少一次投递之外不做任何保证：订阅断开期间发布的消息会丢失，
/// 由调度器下一轮扫描重新发布。
pub struct RedisPubSubChannel {
    connection: RedisConnection,
}

impl RedisPubSubChannel {
    pub fn new(connection: RedisConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl MessageChannel for RedisPubSubChannel {
    async fn publish(&self, channel: &str, payload: &str) -> SchedulerResult<()> {
        let mut conn = self.connection.manager();
        let receivers: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| SchedulerError::Channel(format!("PUBLISH to {channel} failed: {e}")))?;
        debug!(channel, receivers, "消息已发布");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> SchedulerResult<PayloadStream> {
        let mut pubsub = self
            .connection
            .client()
            .get_async_pubsub()
            .await
            .map_err(|e| SchedulerError::Channel(format!("Failed to open pubsub connection: {e}")))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| SchedulerError::Channel(format!("SUBSCRIBE to {channel} failed: {e}")))?;
        info!(channel, "已订阅Redis通道");

        let stream = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload_bytes().to_vec());
        Ok(stream.boxed())
    }
}
