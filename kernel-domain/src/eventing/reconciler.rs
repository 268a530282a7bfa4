//! 对账器（Reconciler）
//!
//! 周期性扫描日志（或窄范围的跨聚合索引），找出停留在可推进状态的聚合
//! （总线漏投递或工作流中途崩溃的征兆），并重新调用与反应调度相同的工作流。
//!
use async_trait::async_trait;

#[async_trait]
pub trait Reconciler: Send + Sync {
    /// 对账器名称（用于日志）
    fn name(&self) -> &str;

    /// 执行一轮对账，返回被重新推进的聚合数量
    async fn reconcile(&self) -> anyhow::Result<usize>;
}
