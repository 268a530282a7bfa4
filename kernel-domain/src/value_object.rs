//! 值对象（Value Object）
//!
//! 无标识、以值相等为准的对象。
//!
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日志位点（用于乐观并发控制）
///
/// 由事件日志在追加时分配，全局严格递增且无间隙，从 1 开始。
///
/// # 示例
///
/// ```
/// use kernel_domain::value_object::Position;
///
/// let p1 = Position::first();
/// assert_eq!(p1.value(), 1);
///
/// let p2 = p1.next();
/// assert_eq!(p2.value(), 2);
/// assert!(p2 > p1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    /// 第一个事件的位点
    pub const fn first() -> Self {
        Self(1)
    }

    pub const fn from_value(value: u64) -> Self {
        Self(value)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Position> for u64 {
    fn from(p: Position) -> Self {
        p.0
    }
}
