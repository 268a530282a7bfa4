//! 评审请求聚合（ReviewRequest）
//!
//! 作者请求社区评审自己的预印本：
//! `NotStarted → InProgress（选择署名方式）→ Published`。
//! 公开后由系统在频道通知一次，并记录 `ReviewRequestAnnounced`。
//!
use super::ids::{Actor, PreprintId, ReviewRequestId, UserId};
use kernel_application::Command;
use kernel_domain::aggregate::Aggregate;
use kernel_domain::domain_event::DomainEvent;
use kernel_domain::persist::EventFilter;
use serde::{Deserialize, Serialize};

/// 请求公开时使用的署名方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Public,
    Pseudonym,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ReviewRequestEvent {
    ReviewRequestStarted {
        request_id: ReviewRequestId,
        requester: UserId,
        preprint: PreprintId,
    },
    PersonaChosen {
        request_id: ReviewRequestId,
        persona: Persona,
    },
    ReviewRequestPublished {
        request_id: ReviewRequestId,
    },
    ReviewRequestAnnounced {
        request_id: ReviewRequestId,
    },
}

impl DomainEvent for ReviewRequestEvent {
    const KINDS: &'static [&'static str] = &[
        "ReviewRequestStarted",
        "PersonaChosen",
        "ReviewRequestPublished",
        "ReviewRequestAnnounced",
    ];

    fn kind(&self) -> &'static str {
        match self {
            Self::ReviewRequestStarted { .. } => "ReviewRequestStarted",
            Self::PersonaChosen { .. } => "PersonaChosen",
            Self::ReviewRequestPublished { .. } => "ReviewRequestPublished",
            Self::ReviewRequestAnnounced { .. } => "ReviewRequestAnnounced",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            Self::ReviewRequestStarted { request_id, .. }
            | Self::PersonaChosen { request_id, .. }
            | Self::ReviewRequestPublished { request_id }
            | Self::ReviewRequestAnnounced { request_id } => request_id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewRequestState {
    NotStarted,
    InProgress {
        requester: UserId,
        preprint: PreprintId,
        persona: Option<Persona>,
    },
    Published {
        requester: UserId,
        preprint: PreprintId,
        persona: Persona,
        announced: bool,
    },
}

impl ReviewRequestState {
    pub fn requester(&self) -> Option<&UserId> {
        match self {
            Self::NotStarted => None,
            Self::InProgress { requester, .. } | Self::Published { requester, .. } => {
                Some(requester)
            }
        }
    }

    /// 已公开但尚未通知
    pub fn awaits_announcement(&self) -> bool {
        matches!(self, Self::Published { announced: false, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewRequestAction {
    Start { preprint: PreprintId },
    ChoosePersona { persona: Persona },
    Publish,
    /// 系统记录通知已发出
    MarkAnnounced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequestCommand {
    pub request_id: ReviewRequestId,
    pub actor: Actor,
    pub action: ReviewRequestAction,
}

impl ReviewRequestCommand {
    pub fn new(
        request_id: impl Into<ReviewRequestId>,
        actor: Actor,
        action: ReviewRequestAction,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            actor,
            action,
        }
    }
}

impl Command for ReviewRequestCommand {
    fn name(&self) -> &'static str {
        match self.action {
            ReviewRequestAction::Start { .. } => "StartReviewRequest",
            ReviewRequestAction::ChoosePersona { .. } => "ChoosePersona",
            ReviewRequestAction::Publish => "PublishReviewRequest",
            ReviewRequestAction::MarkAnnounced => "MarkReviewRequestAnnounced",
        }
    }

    fn aggregate_id(&self) -> &str {
        self.request_id.as_str()
    }

    fn actor_id(&self) -> String {
        self.actor.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewRequestError {
    #[error("review request has not been started")]
    NotStarted,
    #[error("review request has already been started")]
    AlreadyStarted,
    #[error("a persona must be chosen before publishing")]
    PersonaNotChosen,
    #[error("review request has already been published")]
    AlreadyPublished,
    #[error("review request has not been published")]
    NotPublished,
}

pub struct ReviewRequest;

impl Aggregate for ReviewRequest {
    const TYPE: &'static str = "review_request";

    type Event = ReviewRequestEvent;
    type State = ReviewRequestState;
    type Command = ReviewRequestCommand;
    type Error = ReviewRequestError;

    fn filter(aggregate_id: &str) -> EventFilter {
        EventFilter::kinds(ReviewRequestEvent::KINDS.iter().copied())
            .with_field("request_id", aggregate_id)
    }

    fn fold_state(events: &[ReviewRequestEvent], aggregate_id: &str) -> ReviewRequestState {
        use ReviewRequestEvent as E;
        use ReviewRequestState as S;

        let mut state = S::NotStarted;
        for event in events.iter().filter(|e| e.aggregate_id() == aggregate_id) {
            state = match (state, event) {
                (S::NotStarted, E::ReviewRequestStarted { requester, preprint, .. }) => {
                    S::InProgress {
                        requester: requester.clone(),
                        preprint: preprint.clone(),
                        persona: None,
                    }
                }
                (S::InProgress { requester, preprint, .. }, E::PersonaChosen { persona, .. }) => {
                    S::InProgress {
                        requester,
                        preprint,
                        persona: Some(*persona),
                    }
                }
                (
                    S::InProgress {
                        requester,
                        preprint,
                        persona: Some(persona),
                    },
                    E::ReviewRequestPublished { .. },
                ) => S::Published {
                    requester,
                    preprint,
                    persona,
                    announced: false,
                },
                (
                    S::Published {
                        requester,
                        preprint,
                        persona,
                        ..
                    },
                    E::ReviewRequestAnnounced { .. },
                ) => S::Published {
                    requester,
                    preprint,
                    persona,
                    announced: true,
                },
                (state, _) => state,
            };
        }
        state
    }

    fn authorize(state: &ReviewRequestState, command: &ReviewRequestCommand) -> bool {
        let system_only = command.action == ReviewRequestAction::MarkAnnounced;
        match command.actor.user_id() {
            Some(_) if system_only => false,
            Some(user) => state.requester().is_none_or(|requester| requester == user),
            None => system_only,
        }
    }

    fn decide(
        state: &ReviewRequestState,
        command: &ReviewRequestCommand,
    ) -> Result<Vec<ReviewRequestEvent>, ReviewRequestError> {
        use ReviewRequestAction as A;
        use ReviewRequestState as S;

        let request_id = command.request_id.clone();

        match (state, &command.action) {
            (S::NotStarted, A::Start { preprint }) => Ok(command
                .actor
                .user_id()
                .map(|requester| ReviewRequestEvent::ReviewRequestStarted {
                    request_id,
                    requester: requester.clone(),
                    preprint: preprint.clone(),
                })
                .into_iter()
                .collect()),
            (S::NotStarted, _) => Err(ReviewRequestError::NotStarted),
            (S::InProgress { .. }, A::Start { .. }) => Err(ReviewRequestError::AlreadyStarted),
            (S::InProgress { .. }, A::MarkAnnounced) => Err(ReviewRequestError::NotPublished),
            (S::InProgress { persona: current, .. }, A::ChoosePersona { persona }) => {
                if *current == Some(*persona) {
                    return Ok(vec![]);
                }
                Ok(vec![ReviewRequestEvent::PersonaChosen {
                    request_id,
                    persona: *persona,
                }])
            }
            (S::InProgress { persona: None, .. }, A::Publish) => {
                Err(ReviewRequestError::PersonaNotChosen)
            }
            (S::InProgress { .. }, A::Publish) => {
                Ok(vec![ReviewRequestEvent::ReviewRequestPublished { request_id }])
            }
            (S::Published { announced, .. }, A::MarkAnnounced) => {
                if *announced {
                    return Ok(vec![]);
                }
                Ok(vec![ReviewRequestEvent::ReviewRequestAnnounced { request_id }])
            }
            (S::Published { .. }, _) => Err(ReviewRequestError::AlreadyPublished),
        }
    }
}
