//! 评审领域：聚合决策模块与标识类型
//!
//! 每个聚合以纯函数形式给出过滤器、状态折叠、授权与决策，不做任何 I/O。
//!
pub mod ids;
pub mod review;
pub mod review_request;

pub use ids::{Actor, Doi, PreprintId, RecordId, ReviewId, ReviewRequestId, UserId};
pub use review::{
    Question, Review, ReviewAction, ReviewCommand, ReviewError, ReviewEvent, ReviewState,
};
pub use review_request::{
    Persona, ReviewRequest, ReviewRequestAction, ReviewRequestCommand, ReviewRequestError,
    ReviewRequestEvent, ReviewRequestState,
};
