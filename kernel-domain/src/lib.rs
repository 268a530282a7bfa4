//! 事件溯源内核（kernel-domain）
//!
//! 提供以追加式事件日志为中心的通用抽象与构件：
//! - 事件日志与过滤查询（`persist`）：按类型集合与字段谓词查询，条件追加实现乐观并发；
//! - 领域事件（`domain_event`）：事件载荷协议、事件信封与业务上下文；
//! - 聚合决策协议（`aggregate`）：`fold_state`/`authorize`/`decide` 三个纯函数；
//! - 聚合根编排（`aggregate_root`）：查询 → 折叠 → 条件追加；
//! - 事件系统（`eventing`）：总线、反应处理器、补偿对账与调度引擎。
//!
//! 聚合状态从不直接存储，每次读取都由过滤后的历史事件重新折叠得到。
//!
pub mod aggregate;
pub mod aggregate_root;
pub mod domain_event;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod value_object;
