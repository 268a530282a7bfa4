//! 标识与执行主体
//!
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// 评审 ID
    ReviewId
);
string_id!(
    /// 评审请求 ID
    ReviewRequestId
);
string_id!(UserId);
string_id!(
    /// 预印本标识（如 `doi:10.1101/2024.01.01.000001`）
    PreprintId
);
string_id!(
    /// 外部记录仓库返回的记录 ID
    RecordId
);
string_id!(
    /// 持久标识符
    Doi
);

/// 命令的执行主体
///
/// 用户主体受所有者校验约束；系统主体只用于工作流发出的状态推进命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(UserId),
    System,
}

impl Actor {
    pub fn user(id: impl Into<UserId>) -> Self {
        Self::User(id.into())
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::System => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ReviewId::new("r-1");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("r-1"));
        let back: ReviewId = serde_json::from_value(serde_json::json!("r-1")).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn actor_display_distinguishes_system() {
        assert_eq!(Actor::user("u-1").to_string(), "user:u-1");
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!(Actor::user("u-1").user_id(), Some(&UserId::new("u-1")));
        assert!(Actor::System.user_id().is_none());
    }
}
