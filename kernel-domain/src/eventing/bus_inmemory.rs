//! 内存版事件总线（InMemoryEventBus）
//!
//! 每个订阅者持有独立的有界 `tokio::sync::mpsc` 队列，慢消费者不会阻塞其他订阅者：
//! - `publish`：按订阅顺序把事件放入各订阅者队列，已关闭的订阅者被移除；
//! - `subscribe`：返回 `'static` 生命周期事件流。
//!
//! 背压策略（`BackpressurePolicy`）：
//! - `DropNewest`（默认）：队列已满时丢弃该订阅者的本条事件并告警，由对账补偿；
//! - `Block`：等待队列腾出空间。处理器若在处理过程中发布事件，
//!   其自身队列写满时会形成自等待，仅适用于不回写总线的订阅者。
//!
//! 无持久重放：进程生命周期内每个订阅者至多收到一次。

use crate::error::KernelResult as Result;
use crate::eventing::EventBus;
use crate::persist::SerializedEvent;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackpressurePolicy {
    Block,
    #[default]
    DropNewest,
}

/// 总线配置
#[derive(Clone, Copy, Debug)]
pub struct BusConfig {
    /// 每个订阅者的队列容量
    pub capacity: usize,
    pub policy: BackpressurePolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            policy: BackpressurePolicy::default(),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    config: BusConfig,
    next_id: AtomicU64,
    subscribers: DashMap<u64, mpsc::Sender<SerializedEvent>>,
}

impl InMemoryEventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                next_id: AtomicU64::new(0),
                subscribers: DashMap::new(),
            }),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    // 先复制发送端再投递，避免跨 await 持有 DashMap 分片锁
    fn targets(&self) -> Vec<(u64, mpsc::Sender<SerializedEvent>)> {
        let mut targets: Vec<_> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        targets.sort_by_key(|(id, _)| *id);
        targets
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: &SerializedEvent) -> Result<()> {
        for (id, tx) in self.targets() {
            match self.inner.config.policy {
                BackpressurePolicy::Block => {
                    if tx.send(event.clone()).await.is_err() {
                        self.inner.subscribers.remove(&id);
                    }
                }
                BackpressurePolicy::DropNewest => match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscriber = id,
                            event_id = event.event_id(),
                            kind = event.kind(),
                            aggregate_id = event.aggregate_id(),
                            "subscriber queue full, event dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        self.inner.subscribers.remove(&id);
                    }
                },
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, SerializedEvent> {
        let (tx, rx) = mpsc::channel(self.inner.config.capacity.max(1));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.insert(id, tx);
        Box::pin(ReceiverStream::new(rx))
    }
}
