//! 事件持久化模型（SerializedEvent）
//!
//! 定义事件在日志中的标准形态 `{position, kind, aggregate_id, payload, occurred_at}`，
//! 以及与类型化事件之间的批量编解码。日志中不存在聚合状态的其他表示。
//!
use crate::{
    domain_event::{DomainEvent, EventContext, EventEnvelope},
    error::{KernelError, KernelResult},
    value_object::Position,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// 全局日志位点，由事件日志在追加时赋值
    position: Option<Position>,
    /// 事件唯一标识符
    event_id: String,
    /// 事件类型（判别式），与载荷中的 `kind` 标签一致
    kind: String,
    /// 聚合类型，用于区分不同的聚合
    aggregate_type: String,
    /// 聚合 ID，标识事件所属的聚合实例
    aggregate_id: String,
    /// 事件发生时间
    occurred_at: DateTime<Utc>,
    /// 事件负载（扁平 JSON 对象，字段谓词在此求值）
    payload: Value,
    /// 业务上下文信息
    context: EventContext,
}

impl SerializedEvent {
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    /// 由事件日志在提交时调用
    pub fn committed_at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// 还原为类型化事件信封；未提交（无位点）的事件无法还原
    pub fn decode<E>(&self) -> KernelResult<EventEnvelope<E>>
    where
        E: DomainEvent,
    {
        if !E::KINDS.contains(&self.kind.as_str()) {
            return Err(KernelError::UnknownEventKind {
                expected: E::KINDS,
                found: self.kind.clone(),
            });
        }

        let position = self.position.ok_or_else(|| {
            KernelError::event_log(format!("event {} has not been committed", self.event_id))
        })?;

        let event: E = serde_json::from_value(self.payload.clone())?;

        Ok(EventEnvelope {
            position,
            event_id: self.event_id.clone(),
            occurred_at: self.occurred_at,
            context: self.context.clone(),
            event,
        })
    }
}

/// 将决策产生的新事件编码为待追加的持久化形态
pub fn encode<E>(
    aggregate_type: &str,
    events: &[E],
    context: &EventContext,
) -> KernelResult<Vec<SerializedEvent>>
where
    E: DomainEvent,
{
    let occurred_at = Utc::now();

    events
        .iter()
        .map(|e| {
            Ok(SerializedEvent {
                position: None,
                event_id: Uuid::new_v4().to_string(),
                kind: e.kind().to_string(),
                aggregate_type: aggregate_type.to_string(),
                aggregate_id: e.aggregate_id().to_string(),
                occurred_at,
                payload: serde_json::to_value(e)?,
                context: context.clone(),
            })
        })
        .collect()
}

/// 批量还原已提交事件，保持日志顺序
pub fn decode<E>(events: &[SerializedEvent]) -> KernelResult<Vec<EventEnvelope<E>>>
where
    E: DomainEvent,
{
    events.iter().map(SerializedEvent::decode::<E>).collect()
}
