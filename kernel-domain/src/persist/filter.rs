//! 事件过滤器（EventFilter）
//!
//! 同时用于聚合状态重建的查询范围与条件追加的冲突检测范围。
//!
use super::SerializedEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 字段谓词：载荷中 `name` 字段必须等于 `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub name: String,
    pub value: Value,
}

/// 事件过滤器：接受的事件类型集合 + 必须满足的字段值
///
/// `kinds` 为空表示接受所有类型。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    kinds: Vec<String>,
    fields: Vec<FieldPredicate>,
}

impl EventFilter {
    /// 匹配任意事件
    pub fn any() -> Self {
        Self::default()
    }

    /// 仅接受给定类型的事件
    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
            fields: Vec::new(),
        }
    }

    /// 追加一个字段谓词
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(FieldPredicate {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn accepted_kinds(&self) -> &[String] {
        &self.kinds
    }

    pub fn fields(&self) -> &[FieldPredicate] {
        &self.fields
    }

    pub fn accepts_kind(&self, kind: &str) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|k| k == kind)
    }

    pub fn matches(&self, event: &SerializedEvent) -> bool {
        self.accepts_kind(event.kind())
            && self
                .fields
                .iter()
                .all(|p| event.payload().get(&p.name) == Some(&p.value))
    }
}
