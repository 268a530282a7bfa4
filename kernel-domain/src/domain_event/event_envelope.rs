use chrono::{DateTime, Utc};

use super::DomainEvent;
use super::event_context::EventContext;
use crate::value_object::Position;

/// 事件信封：已提交事件的类型化视图，包含日志位点与业务上下文
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope<E>
where
    E: DomainEvent,
{
    pub position: Position,
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub context: EventContext,
    pub event: E,
}
