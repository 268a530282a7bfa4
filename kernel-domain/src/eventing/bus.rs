//! 事件总线（EventBus）协议
//!
//! 定义已提交事件的发布与订阅抽象。订阅返回 'static 生命周期事件流，
//! 以便在异步运行时（如 tokio::spawn）中消费。
//!
use crate::{error::KernelResult as Result, persist::SerializedEvent};
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 事件总线：负责分发已提交事件
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &SerializedEvent) -> Result<()>;

    async fn publish_batch(&self, events: &[SerializedEvent]) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// 注册一个新订阅者并返回其事件流；调用返回时订阅即已生效
    fn subscribe(&self) -> BoxStream<'static, SerializedEvent>;
}
