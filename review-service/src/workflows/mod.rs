//! 反应工作流
//!
//! 每个工作流由事件触发，调用外部协作者并通过命令处理器发出后续命令。
//! 工作流依据重新加载的聚合状态决定下一步；外部调用完成后以系统命令记录，
//! 重复投递看到已记录的步骤便不再调用协作者。
//!
mod publication;
mod review_request;

pub use publication::{PublicationReaction, PublicationStep, PublicationWorkflow};
pub use review_request::{RequestAnnouncement, ReviewRequestReaction};
