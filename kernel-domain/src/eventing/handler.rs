//! 事件处理器（EventHandler）
//!
//! 定义消费某类/多类/全部事件的反应逻辑与元信息（名称、订阅类型）。
//! 总线不做去重，处理器必须能容忍触发事件的重复投递。
//!
use crate::persist::SerializedEvent;
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
    All,
}

impl HandledEventType {
    pub fn matches(&self, kind: &str) -> bool {
        match self {
            Self::One(k) => k == kind,
            Self::Many(ks) => ks.iter().any(|k| k == kind),
            Self::All => true,
        }
    }
}

/// 事件处理器：处理某一类型的事件
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与审计）
    fn handler_name(&self) -> &str;
    /// 返回该处理器支持的事件类型
    fn handled_event_type(&self) -> HandledEventType;
    /// 处理事件（外部调用 + 后续命令），错误在调度边界被捕获并记录
    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()>;
}
