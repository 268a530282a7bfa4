//! 事件日志协议（EventLog）
//!
//! 追加是唯一的写入方式。条件追加在同一临界区内重新评估过滤器：
//! 若存在位点晚于调用方最后所见位点的匹配事件，则以并发冲突拒绝，
//! 由此在无独立锁服务的情况下实现“每条命令单写者”语义。
//!
use super::{EventFilter, SerializedEvent};
use crate::error::KernelResult;
use crate::value_object::Position;
use async_trait::async_trait;
use std::sync::Arc;

/// 查询结果：按位点排序的匹配事件 + 最后一个匹配事件的位点
///
/// 空结果是正常结果（调用方据此推断“聚合尚未创建”），此时位点为 `None`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub events: Vec<SerializedEvent>,
    pub last_known_position: Option<Position>,
}

/// 追加条件：`filter` 范围内不得出现晚于 `after` 的事件
#[derive(Debug, Clone, PartialEq)]
pub struct AppendCondition {
    pub filter: EventFilter,
    pub after: Option<Position>,
}

impl AppendCondition {
    pub fn new(filter: EventFilter, after: Option<Position>) -> Self {
        Self { filter, after }
    }

    /// 判断某个已提交事件是否与本条件冲突
    pub fn conflicts_with(&self, event: &SerializedEvent) -> bool {
        let newer = match (event.position(), self.after) {
            (Some(p), Some(after)) => p > after,
            (Some(_), None) => true,
            (None, _) => false,
        };
        newer && self.filter.matches(event)
    }
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// 查询匹配过滤器的事件（按位点升序）
    async fn query(&self, filter: &EventFilter) -> KernelResult<QueryResult>;

    /// 按类型集合查询全局有序事件流，用于跨聚合查找与对账
    async fn query_all(&self, kinds: &[&str]) -> KernelResult<Vec<SerializedEvent>>;

    /// 原子地条件追加一批事件，返回带位点的已提交事件
    async fn append(
        &self,
        events: Vec<SerializedEvent>,
        condition: AppendCondition,
    ) -> KernelResult<Vec<SerializedEvent>>;
}

#[async_trait]
impl<T> EventLog for Arc<T>
where
    T: EventLog + ?Sized,
{
    async fn query(&self, filter: &EventFilter) -> KernelResult<QueryResult> {
        (**self).query(filter).await
    }

    async fn query_all(&self, kinds: &[&str]) -> KernelResult<Vec<SerializedEvent>> {
        (**self).query_all(kinds).await
    }

    async fn append(
        &self,
        events: Vec<SerializedEvent>,
        condition: AppendCondition,
    ) -> KernelResult<Vec<SerializedEvent>> {
        (**self).append(events, condition).await
    }
}
