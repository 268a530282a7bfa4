/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求：目标聚合 ID、执行主体与状态迁移载荷。
/// - 不返回业务数据，仅表达执行结果（成功/失败）；
/// - 执行主体用于授权，授权总是基于命令执行前的状态求值。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称，用于日志、追踪与错误信息。避免依赖 `type_name::<T>()`。
    fn name(&self) -> &'static str;

    /// 目标聚合 ID（用于构造事件过滤器）
    fn aggregate_id(&self) -> &str;

    /// 执行主体 ID（写入事件上下文）
    fn actor_id(&self) -> String;
}
