//! 内存版事件日志（InMemoryEventLog）
//!
//! 基于 `tokio::sync::RwLock` 的参考实现：
//! - 查询持有读锁，读者之间互不阻塞；
//! - 条件追加在写锁内完成“检查 → 分配位点 → 追加”，要么全部可见，要么毫无影响。
//!
//! 典型用途：测试环境、示例与本地开发。
//!
use super::{AppendCondition, EventFilter, EventLog, QueryResult, SerializedEvent};
use crate::error::{KernelError, KernelResult};
use crate::value_object::Position;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<SerializedEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前日志长度（即最后一个位点的值）
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn query(&self, filter: &EventFilter) -> KernelResult<QueryResult> {
        let log = self.events.read().await;
        let events: Vec<SerializedEvent> = log
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        let last_known_position = events.last().and_then(SerializedEvent::position);

        Ok(QueryResult {
            events,
            last_known_position,
        })
    }

    async fn query_all(&self, kinds: &[&str]) -> KernelResult<Vec<SerializedEvent>> {
        let filter = EventFilter::kinds(kinds.iter().copied());
        let log = self.events.read().await;
        Ok(log.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn append(
        &self,
        events: Vec<SerializedEvent>,
        condition: AppendCondition,
    ) -> KernelResult<Vec<SerializedEvent>> {
        let mut log = self.events.write().await;

        if let Some(conflict) = log.iter().rev().find(|e| condition.conflicts_with(e)) {
            let actual = conflict
                .position()
                .ok_or_else(|| KernelError::event_log("stored event without position"))?;
            return Err(KernelError::ConcurrencyConflict {
                expected: condition.after,
                actual,
            });
        }

        let mut next = Position::from_value(log.len() as u64).next();
        let mut committed = Vec::with_capacity(events.len());

        for event in events {
            if event.position().is_some() {
                return Err(KernelError::event_log(format!(
                    "event {} is already committed",
                    event.event_id()
                )));
            }
            committed.push(event.committed_at(next));
            next = next.next();
        }

        log.extend(committed.iter().cloned());

        Ok(committed)
    }
}
