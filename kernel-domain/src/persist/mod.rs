//! 事件日志与查询（persist）
//!
//! 定义追加式事件日志及其查询/并发协议：
//! - 事件在持久化层的标准形态（`SerializedEvent`）与类型化编解码（`encode`/`decode`）；
//! - 按类型集合与字段谓词选取事件子集的过滤器（`EventFilter`）；
//! - 查询与条件追加协议（`EventLog`），条件追加是唯一的写入方式；
//! - 基于内存的参考实现（`InMemoryEventLog`）。
//!
//! 具体存储后端（如 Postgres）由上层提供实现并注入。
//!
mod event_log;
mod filter;
mod inmemory_event_log;
mod serialized_event;

pub use event_log::{AppendCondition, EventLog, QueryResult};
pub use filter::{EventFilter, FieldPredicate};
pub use inmemory_event_log::InMemoryEventLog;
pub use serialized_event::{SerializedEvent, decode, encode};
