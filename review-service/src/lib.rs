//! 预印本评审服务
//!
//! 在事件溯源内核之上实现评审与评审请求两个聚合、发布工作流与对账，
//! 外部系统以协作者 trait 的形式注入。
//!
pub mod app;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod reconciliation;
pub mod workflows;

pub use app::App;
pub use collaborators::{Collaborators, InMemoryCollaborators};
pub use config::ServiceConfig;
