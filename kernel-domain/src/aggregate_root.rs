//! 聚合根编排器（AggregateRoot）
//!
//! 封装“查询 → 解码 → 折叠”与“编码 → 条件追加”两段标准流程，
//! 以事件日志（`EventLog`）为依赖，供命令处理器与反应工作流使用。
//!
use crate::{
    aggregate::Aggregate,
    domain_event::{EventContext, EventEnvelope},
    error::KernelResult,
    persist::{AppendCondition, EventFilter, EventLog, SerializedEvent, decode, encode},
    value_object::Position,
};
use std::marker::PhantomData;
use std::sync::Arc;

/// 一次加载的结果：当前状态及其并发令牌
pub struct Loaded<A>
where
    A: Aggregate,
{
    pub aggregate_id: String,
    pub state: A::State,
    pub filter: EventFilter,
    pub last_known_position: Option<Position>,
    pub history: Vec<EventEnvelope<A::Event>>,
}

impl<A> Loaded<A>
where
    A: Aggregate,
{
    /// 基于加载时所见位点的追加条件
    pub fn append_condition(&self) -> AppendCondition {
        AppendCondition::new(self.filter.clone(), self.last_known_position)
    }
}

/// 面向应用层的聚合根编排器。
///
/// - `A`：聚合类型（实现 `Aggregate`）
pub struct AggregateRoot<A>
where
    A: Aggregate,
{
    log: Arc<dyn EventLog>,
    _marker: PhantomData<fn() -> A>,
}

impl<A> Clone for AggregateRoot<A>
where
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
            _marker: PhantomData,
        }
    }
}

impl<A> AggregateRoot<A>
where
    A: Aggregate,
{
    /// 创建编排器实例
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self {
            log,
            _marker: PhantomData,
        }
    }

    /// 加载聚合：
    /// 1. 由聚合 ID 构造过滤器；
    /// 2. 查询日志得到事件与最后位点；
    /// 3. 解码并折叠为当前状态。
    pub async fn load(&self, aggregate_id: &str) -> KernelResult<Loaded<A>> {
        let filter = A::filter(aggregate_id);
        let result = self.log.query(&filter).await?;
        let history = decode::<A::Event>(&result.events)?;

        let events: Vec<A::Event> = history.iter().map(|env| env.event.clone()).collect();
        let state = A::fold_state(&events, aggregate_id);

        Ok(Loaded {
            aggregate_id: aggregate_id.to_string(),
            state,
            filter,
            last_known_position: result.last_known_position,
            history,
        })
    }

    /// 以加载时的过滤器与位点为条件追加新事件（一次命令恰好一次追加）
    pub async fn commit(
        &self,
        loaded: &Loaded<A>,
        events: &[A::Event],
        context: &EventContext,
    ) -> KernelResult<Vec<SerializedEvent>> {
        let serialized = encode(A::TYPE, events, context)?;
        self.log.append(serialized, loaded.append_condition()).await
    }
}
