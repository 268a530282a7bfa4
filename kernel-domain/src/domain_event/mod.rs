//! 领域事件（Domain Event）
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`），以及将事件与日志位点、
//! 业务上下文封装后的 `EventEnvelope`。

mod domain_event_trait;
mod event_context;
mod event_envelope;

pub use domain_event_trait::DomainEvent;
pub use event_context::EventContext;
pub use event_envelope::EventEnvelope;
