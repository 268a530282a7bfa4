use kernel_domain::domain_event::EventContext;
use kernel_domain::persist::SerializedEvent;

/// 应用层上下文（Application Context）
///
/// 承载一次命令调用所需的横切信息：关联追踪 `correlation_id` 与因果链 `causation_id`。
/// 执行主体由命令自身携带，处理器在追加前写入事件上下文。
///
/// 典型用法：
/// ```rust
/// use kernel_application::context::AppContext;
/// use kernel_domain::domain_event::EventContext;
///
/// let ctx = AppContext {
///     biz: EventContext::builder()
///         .correlation_id("cor-123".to_string())
///         .build(),
/// };
/// assert_eq!(ctx.biz.correlation_id(), Some("cor-123"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 业务语境（链路追踪、操作因果）
    pub biz: EventContext,
}

impl AppContext {
    /// 由触发事件派生后续命令的上下文：沿用其关联 ID，因果 ID 指向该事件
    pub fn caused_by(event: &SerializedEvent) -> Self {
        let correlation_id = event
            .context()
            .correlation_id()
            .unwrap_or(event.event_id())
            .to_string();

        Self {
            biz: EventContext::builder()
                .correlation_id(correlation_id)
                .causation_id(event.event_id().to_string())
                .build(),
        }
    }
}
