//! 事件子系统（eventing）
//!
//! 提供已提交事件的广播、反应与补偿的基础抽象与运行时：
//! - `EventBus`：统一发布/订阅接口，每个订阅者独享有界队列；
//! - `EventHandler`：反应工作流，按事件类型匹配；
//! - `Reconciler`：周期性全量扫描，修复漏投递或中途崩溃的工作流；
//! - `EventEngine`：为每个处理器运行单线程消费循环，并调度对账任务。
//!
//! 总线不提供持久重放，至多一次投递；对账是其持久性兜底。
//!
pub mod bus;
pub mod bus_inmemory;
pub mod engine;
pub mod handler;
pub mod reconciler;

pub use bus::EventBus;
pub use bus_inmemory::{BackpressurePolicy, BusConfig, InMemoryEventBus};
pub use engine::{EngineHandle, EventEngine, EventEngineConfig};
pub use handler::{EventHandler, HandledEventType};
pub use reconciler::Reconciler;
