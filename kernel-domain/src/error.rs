//! 内核统一错误定义
//!
//! 聚焦序列化、事件日志、并发冲突与事件系统的最小必要集合。
//! 存储细节一律折叠为 `EventLog`，调用方不与具体后端耦合。
//!
use crate::value_object::Position;
use thiserror::Error;

/// 内核错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum KernelError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("unknown event kind: expected one of {expected:?}, found={found}")]
    UnknownEventKind {
        expected: &'static [&'static str],
        found: String,
    },

    // --- 事件日志 ---
    #[error("concurrency conflict: expected last position={expected:?}, actual={actual}")]
    ConcurrencyConflict {
        expected: Option<Position>,
        actual: Position,
    },
    #[error("event log error: {reason}")]
    EventLog { reason: String },

    // --- 事件系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
}

impl KernelError {
    pub fn event_log(reason: impl Into<String>) -> Self {
        Self::EventLog {
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    /// 并发冲突可由调用方重新读取后重试，其余错误均为终态
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// 统一 Result 类型别名
pub type KernelResult<T> = Result<T, KernelError>;

// 允许在基础设施层直接使用 `?` 将 sqlx 错误转换为 KernelError
#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for KernelError {
    fn from(err: sqlx::Error) -> Self {
        KernelError::EventLog {
            reason: err.to_string(),
        }
    }
}
