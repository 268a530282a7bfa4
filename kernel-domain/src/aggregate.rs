//! 聚合决策协议（Aggregate）
//!
//! 每种聚合提供四个纯函数（无 I/O）：
//! - `filter` 根据聚合 ID 构造查询/冲突检测范围；
//! - `fold_state` 将过滤后的历史事件折叠为当前状态（确定、对顺序敏感）；
//! - `authorize` 基于命令执行前的状态判断主体是否有权执行；
//! - `decide` 对所有状态全定义，返回零到多个新事件或类型化的领域错误。
//!
//! 幂等规则：请求的值与当前记录值相同时返回空事件列表而非重复事件。
//!
use crate::domain_event::DomainEvent;
use crate::persist::EventFilter;
use std::error::Error;
use std::fmt;

/// 聚合决策接口
pub trait Aggregate: Send + Sync + 'static {
    /// 聚合类型名（写入事件的 `aggregate_type`）
    const TYPE: &'static str;

    /// 该聚合折叠/产生的领域事件类型
    type Event: DomainEvent;
    /// 由事件折叠得到的生命周期状态（封闭枚举）
    type State: Clone + PartialEq + fmt::Debug + Send + Sync;
    /// 该聚合支持的命令类型
    type Command: fmt::Debug + Send + Sync;
    /// 决策环节的领域错误类型
    type Error: Error + Send + Sync + 'static;

    /// 聚合的事件范围
    fn filter(aggregate_id: &str) -> EventFilter;

    /// 由历史事件重建状态；需忽略不属于 `aggregate_id` 的事件
    fn fold_state(events: &[Self::Event], aggregate_id: &str) -> Self::State;

    /// 创建前的状态对任意主体放行，其余状态比对记录的所有者
    fn authorize(state: &Self::State, command: &Self::Command) -> bool;

    /// 计算命令产生的事件
    fn decide(state: &Self::State, command: &Self::Command)
    -> Result<Vec<Self::Event>, Self::Error>;
}


#[cfg(test)]
mod tests {
    use super::Aggregate;
    use super::test_fixtures::*;

    fn cmd(actor: &str, action: SwitchAction) -> SwitchCommand {
        SwitchCommand {
            switch_id: "s-1".into(),
            actor: actor.into(),
            action,
        }
    }

    #[test]
    fn fold_ignores_foreign_aggregates_and_is_deterministic() {
        let events = vec![
            SwitchEvent::Installed {
                switch_id: "s-1".into(),
                owner: "u-1".into(),
            },
            SwitchEvent::Installed {
                switch_id: "s-2".into(),
                owner: "u-2".into(),
            },
            SwitchEvent::Toggled {
                switch_id: "s-2".into(),
                on: true,
            },
        ];

        let a = Switch::fold_state(&events, "s-1");
        let b = Switch::fold_state(&events, "s-1");
        assert_eq!(a, b);
        assert_eq!(
            a,
            SwitchState::Installed {
                owner: "u-1".into(),
                on: false
            }
        );
    }

    #[test]
    fn decide_is_idempotent_for_unchanged_values() {
        let state = SwitchState::Installed {
            owner: "u-1".into(),
            on: true,
        };
        assert!(Switch::decide(&state, &cmd("u-1", SwitchAction::Set(true))).unwrap().is_empty());
        assert_eq!(
            Switch::decide(&state, &cmd("u-1", SwitchAction::Set(false)))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn authorize_compares_owner_except_before_creation() {
        let state = SwitchState::Installed {
            owner: "u-1".into(),
            on: false,
        };
        assert!(Switch::authorize(&state, &cmd("u-1", SwitchAction::Set(true))));
        assert!(!Switch::authorize(&state, &cmd("u-2", SwitchAction::Set(true))));
        assert!(Switch::authorize(&SwitchState::Missing, &cmd("anyone", SwitchAction::Install)));
    }
}
