use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use summary_core::traits::{MessageChannel, PayloadStream};
use summary_core::SchedulerResult;
use tokio::sync::mpsc;

use super::lock::poison_err;

/// 进程内发布/订阅通道
///
/// 与Redis Pub/Sub一样扇出到所有订阅者；没有订阅者时发布的消息直接丢弃。
/// 每个订阅者有独立的无界队列，订阅者处理变慢时消息在队列中等待，发布不会挤掉旧消息。
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 关闭通道上的所有订阅，订阅流在取完已排队的消息后结束
    pub fn disconnect_subscribers(&self, channel: &str) -> SchedulerResult<()> {
        self.subscribers.lock().map_err(poison_err)?.remove(channel);
        Ok(())
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| {
                subscribers
                    .get(channel)
                    .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(&self, channel: &str, payload: &str) -> SchedulerResult<()> {
        let mut subscribers = self.subscribers.lock().map_err(poison_err)?;
        if let Some(senders) = subscribers.get_mut(channel) {
            // 发送失败说明订阅流已被丢弃
            senders.retain(|tx| tx.send(payload.as_bytes().to_vec()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> SchedulerResult<PayloadStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .map_err(poison_err)?
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|payload| (payload, rx))
        });
        Ok(stream.boxed())
    }
}
