use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
///
/// 实现者应为封闭的 serde 枚举，并使用 `#[serde(tag = "kind")]` 内部标签，
/// 使持久化载荷为扁平对象，字段谓词（如 `review_id`）可直接在载荷上求值。
pub trait DomainEvent:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 该事件类型可能出现的全部 kind（与 serde 标签一致）
    const KINDS: &'static [&'static str];

    /// 事件 kind（判别式）
    fn kind(&self) -> &'static str;

    /// 事件所属聚合 ID
    fn aggregate_id(&self) -> &str;
}
