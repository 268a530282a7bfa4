//! 评审聚合（Review）
//!
//! 生命周期：
//! `NotStarted → AwaitingInput → Answered ⇄ Answered → Publishing → Published`
//!
//! - 用户命令：`Start`、`AnswerQuestion`、`RequestPublication`；
//! - 状态推进命令（仅系统主体，由发布工作流发出）：
//!   `MarkRecordCreated`、`MarkIdentifierAssigned`、`MarkPublished`。
//!
//! `Publishing` 与 `Published` 拒绝全部用户命令，只接受对应阶段的推进命令；
//! 重复推进同一记录或同一 DOI 不产生事件。
//!
use super::ids::{Actor, Doi, PreprintId, RecordId, ReviewId, UserId};
use kernel_application::Command;
use kernel_domain::aggregate::Aggregate;
use kernel_domain::domain_event::DomainEvent;
use kernel_domain::persist::EventFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 评审问卷的问题（声明顺序即展示与报错顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Question {
    Summary,
    Methodology,
    CompetingInterests,
    CodeOfConduct,
}

impl Question {
    pub const ALL: [Question; 4] = [
        Question::Summary,
        Question::Methodology,
        Question::CompetingInterests,
        Question::CodeOfConduct,
    ];

    pub fn is_required(self) -> bool {
        !matches!(self, Question::Methodology)
    }

    /// 尚未回答的必答问题
    pub fn missing_from(answers: &BTreeMap<Question, String>) -> Vec<Question> {
        Self::ALL
            .into_iter()
            .filter(|q| q.is_required() && !answers.contains_key(q))
            .collect()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Summary => "summary",
            Self::Methodology => "methodology",
            Self::CompetingInterests => "competing_interests",
            Self::CodeOfConduct => "code_of_conduct",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ReviewEvent {
    ReviewStarted {
        review_id: ReviewId,
        owner: UserId,
        preprint: PreprintId,
    },
    QuestionAnswered {
        review_id: ReviewId,
        question: Question,
        answer: String,
    },
    PublicationRequested {
        review_id: ReviewId,
    },
    RecordCreated {
        review_id: ReviewId,
        record_id: RecordId,
    },
    IdentifierAssigned {
        review_id: ReviewId,
        doi: Doi,
    },
    ReviewPublished {
        review_id: ReviewId,
    },
    RecordPublished {
        review_id: ReviewId,
    },
    PublicationAnnounced {
        review_id: ReviewId,
    },
}

impl DomainEvent for ReviewEvent {
    const KINDS: &'static [&'static str] = &[
        "ReviewStarted",
        "QuestionAnswered",
        "PublicationRequested",
        "RecordCreated",
        "IdentifierAssigned",
        "ReviewPublished",
        "RecordPublished",
        "PublicationAnnounced",
    ];

    fn kind(&self) -> &'static str {
        match self {
            Self::ReviewStarted { .. } => "ReviewStarted",
            Self::QuestionAnswered { .. } => "QuestionAnswered",
            Self::PublicationRequested { .. } => "PublicationRequested",
            Self::RecordCreated { .. } => "RecordCreated",
            Self::IdentifierAssigned { .. } => "IdentifierAssigned",
            Self::ReviewPublished { .. } => "ReviewPublished",
            Self::RecordPublished { .. } => "RecordPublished",
            Self::PublicationAnnounced { .. } => "PublicationAnnounced",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            Self::ReviewStarted { review_id, .. }
            | Self::QuestionAnswered { review_id, .. }
            | Self::PublicationRequested { review_id }
            | Self::RecordCreated { review_id, .. }
            | Self::IdentifierAssigned { review_id, .. }
            | Self::ReviewPublished { review_id }
            | Self::RecordPublished { review_id }
            | Self::PublicationAnnounced { review_id } => review_id.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewState {
    NotStarted,
    AwaitingInput {
        owner: UserId,
        preprint: PreprintId,
    },
    Answered {
        owner: UserId,
        preprint: PreprintId,
        answers: BTreeMap<Question, String>,
    },
    Publishing {
        owner: UserId,
        preprint: PreprintId,
        answers: BTreeMap<Question, String>,
        record: Option<RecordId>,
        doi: Option<Doi>,
    },
    Published {
        owner: UserId,
        preprint: PreprintId,
        answers: BTreeMap<Question, String>,
        record: RecordId,
        doi: Doi,
        /// 外部记录已公开
        record_published: bool,
        /// 已在聊天频道发布通知
        announced: bool,
    },
}

impl ReviewState {
    pub fn owner(&self) -> Option<&UserId> {
        match self {
            Self::NotStarted => None,
            Self::AwaitingInput { owner, .. }
            | Self::Answered { owner, .. }
            | Self::Publishing { owner, .. }
            | Self::Published { owner, .. } => Some(owner),
        }
    }

    pub fn is_publishing(&self) -> bool {
        matches!(self, Self::Publishing { .. })
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    /// 发布流程尚有未完成的步骤（包括发布后的公开与通知）
    pub fn has_pending_publication_work(&self) -> bool {
        match self {
            Self::Publishing { .. } => true,
            Self::Published {
                record_published,
                announced,
                ..
            } => !record_published || !announced,
            _ => false,
        }
    }

    fn apply(self, event: &ReviewEvent) -> Self {
        use ReviewEvent as E;

        match (self, event) {
            (Self::NotStarted, E::ReviewStarted { owner, preprint, .. }) => Self::AwaitingInput {
                owner: owner.clone(),
                preprint: preprint.clone(),
            },
            (
                Self::AwaitingInput { owner, preprint },
                E::QuestionAnswered {
                    question, answer, ..
                },
            ) => Self::Answered {
                owner,
                preprint,
                answers: BTreeMap::from([(*question, answer.clone())]),
            },
            (
                Self::Answered {
                    owner,
                    preprint,
                    mut answers,
                },
                E::QuestionAnswered { question, answer, .. },
            ) => {
                answers.insert(*question, answer.clone());
                Self::Answered {
                    owner,
                    preprint,
                    answers,
                }
            }
            (
                Self::Answered {
                    owner,
                    preprint,
                    answers,
                },
                E::PublicationRequested { .. },
            ) => Self::Publishing {
                owner,
                preprint,
                answers,
                record: None,
                doi: None,
            },
            (
                Self::Publishing {
                    owner,
                    preprint,
                    answers,
                    doi,
                    ..
                },
                E::RecordCreated { record_id, .. },
            ) => Self::Publishing {
                owner,
                preprint,
                answers,
                record: Some(record_id.clone()),
                doi,
            },
            (
                Self::Publishing {
                    owner,
                    preprint,
                    answers,
                    record,
                    ..
                },
                E::IdentifierAssigned { doi, .. },
            ) => Self::Publishing {
                owner,
                preprint,
                answers,
                record,
                doi: Some(doi.clone()),
            },
            (
                Self::Publishing {
                    owner,
                    preprint,
                    answers,
                    record: Some(record),
                    doi: Some(doi),
                },
                E::ReviewPublished { .. },
            ) => Self::Published {
                owner,
                preprint,
                answers,
                record,
                doi,
                record_published: false,
                announced: false,
            },
            (
                Self::Published {
                    owner,
                    preprint,
                    answers,
                    record,
                    doi,
                    announced,
                    ..
                },
                E::RecordPublished { .. },
            ) => Self::Published {
                owner,
                preprint,
                answers,
                record,
                doi,
                record_published: true,
                announced,
            },
            (
                Self::Published {
                    owner,
                    preprint,
                    answers,
                    record,
                    doi,
                    record_published,
                    ..
                },
                E::PublicationAnnounced { .. },
            ) => Self::Published {
                owner,
                preprint,
                answers,
                record,
                doi,
                record_published,
                announced: true,
            },
            // 与当前阶段不符的事件不会由 decide 产生，折叠时忽略
            (state, _) => state,
        }
    }
}

/// 命令载荷
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewAction {
    Start { preprint: PreprintId },
    AnswerQuestion { question: Question, answer: String },
    RequestPublication,
    MarkRecordCreated { record_id: RecordId },
    MarkIdentifierAssigned { doi: Doi },
    MarkPublished,
    MarkRecordPublished,
    MarkAnnounced,
}

impl ReviewAction {
    /// 是否为发布工作流的状态推进命令
    pub fn is_status_advancing(&self) -> bool {
        matches!(
            self,
            Self::MarkRecordCreated { .. }
                | Self::MarkIdentifierAssigned { .. }
                | Self::MarkPublished
                | Self::MarkRecordPublished
                | Self::MarkAnnounced
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCommand {
    pub review_id: ReviewId,
    pub actor: Actor,
    pub action: ReviewAction,
}

impl ReviewCommand {
    pub fn new(review_id: impl Into<ReviewId>, actor: Actor, action: ReviewAction) -> Self {
        Self {
            review_id: review_id.into(),
            actor,
            action,
        }
    }
}

impl Command for ReviewCommand {
    fn name(&self) -> &'static str {
        match self.action {
            ReviewAction::Start { .. } => "StartReview",
            ReviewAction::AnswerQuestion { .. } => "AnswerQuestion",
            ReviewAction::RequestPublication => "RequestPublication",
            ReviewAction::MarkRecordCreated { .. } => "MarkRecordCreated",
            ReviewAction::MarkIdentifierAssigned { .. } => "MarkIdentifierAssigned",
            ReviewAction::MarkPublished => "MarkPublished",
            ReviewAction::MarkRecordPublished => "MarkRecordPublished",
            ReviewAction::MarkAnnounced => "MarkAnnounced",
        }
    }

    fn aggregate_id(&self) -> &str {
        self.review_id.as_str()
    }

    fn actor_id(&self) -> String {
        self.actor.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("review has not been started")]
    NotStarted,
    #[error("review has already been started")]
    AlreadyStarted,
    #[error("review is being published")]
    PublicationInProgress,
    #[error("review has already been published")]
    AlreadyPublished,
    #[error("review is not ready to publish, missing: {}", format_questions(.missing))]
    NotReady { missing: Vec<Question> },
    #[error("publication has not been requested")]
    PublicationNotRequested,
    #[error("no record has been created yet")]
    RecordNotCreated,
    #[error("a different record was already created: {existing}")]
    RecordAlreadyCreated { existing: RecordId },
    #[error("no identifier has been assigned yet")]
    IdentifierNotAssigned,
    #[error("a different identifier was already assigned: {existing}")]
    IdentifierAlreadyAssigned { existing: Doi },
}

fn format_questions(questions: &[Question]) -> String {
    questions
        .iter()
        .map(Question::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct Review;

impl Aggregate for Review {
    const TYPE: &'static str = "review";

    type Event = ReviewEvent;
    type State = ReviewState;
    type Command = ReviewCommand;
    type Error = ReviewError;

    fn filter(aggregate_id: &str) -> EventFilter {
        EventFilter::kinds(ReviewEvent::KINDS.iter().copied()).with_field("review_id", aggregate_id)
    }

    fn fold_state(events: &[ReviewEvent], aggregate_id: &str) -> ReviewState {
        events
            .iter()
            .filter(|event| event.aggregate_id() == aggregate_id)
            .fold(ReviewState::NotStarted, ReviewState::apply)
    }

    fn authorize(state: &ReviewState, command: &ReviewCommand) -> bool {
        match &command.actor {
            Actor::System => command.action.is_status_advancing(),
            Actor::User(_) if command.action.is_status_advancing() => false,
            Actor::User(user) => state.owner().is_none_or(|owner| owner == user),
        }
    }

    fn decide(
        state: &ReviewState,
        command: &ReviewCommand,
    ) -> Result<Vec<ReviewEvent>, ReviewError> {
        use ReviewAction as A;
        use ReviewState as S;

        let review_id = command.review_id.clone();

        match (state, &command.action) {
            (S::NotStarted, A::Start { preprint }) => match command.actor.user_id() {
                Some(owner) => Ok(vec![ReviewEvent::ReviewStarted {
                    review_id,
                    owner: owner.clone(),
                    preprint: preprint.clone(),
                }]),
                // 系统主体在授权阶段已被拒绝
                None => Ok(vec![]),
            },
            (S::NotStarted, _) => Err(ReviewError::NotStarted),

            (S::AwaitingInput { .. } | S::Answered { .. }, A::Start { .. }) => {
                Err(ReviewError::AlreadyStarted)
            }
            (S::AwaitingInput { .. }, A::AnswerQuestion { question, answer }) => {
                Ok(vec![ReviewEvent::QuestionAnswered {
                    review_id,
                    question: *question,
                    answer: answer.clone(),
                }])
            }
            (S::Answered { answers, .. }, A::AnswerQuestion { question, answer }) => {
                if answers.get(question) == Some(answer) {
                    return Ok(vec![]);
                }
                Ok(vec![ReviewEvent::QuestionAnswered {
                    review_id,
                    question: *question,
                    answer: answer.clone(),
                }])
            }
            (S::AwaitingInput { .. }, A::RequestPublication) => Err(ReviewError::NotReady {
                missing: Question::missing_from(&BTreeMap::new()),
            }),
            (S::Answered { answers, .. }, A::RequestPublication) => {
                let missing = Question::missing_from(answers);
                if !missing.is_empty() {
                    return Err(ReviewError::NotReady { missing });
                }
                Ok(vec![ReviewEvent::PublicationRequested { review_id }])
            }
            (S::AwaitingInput { .. } | S::Answered { .. }, _) => {
                Err(ReviewError::PublicationNotRequested)
            }

            (S::Publishing { record, .. }, A::MarkRecordCreated { record_id }) => match record {
                None => Ok(vec![ReviewEvent::RecordCreated {
                    review_id,
                    record_id: record_id.clone(),
                }]),
                Some(existing) if existing == record_id => Ok(vec![]),
                Some(existing) => Err(ReviewError::RecordAlreadyCreated {
                    existing: existing.clone(),
                }),
            },
            (
                S::Publishing { record: None, .. },
                A::MarkIdentifierAssigned { .. } | A::MarkPublished,
            ) => Err(ReviewError::RecordNotCreated),
            (S::Publishing { doi: held, .. }, A::MarkIdentifierAssigned { doi }) => match held {
                None => Ok(vec![ReviewEvent::IdentifierAssigned {
                    review_id,
                    doi: doi.clone(),
                }]),
                Some(existing) if existing == doi => Ok(vec![]),
                Some(existing) => Err(ReviewError::IdentifierAlreadyAssigned {
                    existing: existing.clone(),
                }),
            },
            (S::Publishing { doi: None, .. }, A::MarkPublished) => {
                Err(ReviewError::IdentifierNotAssigned)
            }
            (S::Publishing { .. }, A::MarkPublished) => {
                Ok(vec![ReviewEvent::ReviewPublished { review_id }])
            }
            (S::Publishing { .. }, _) => Err(ReviewError::PublicationInProgress),

            (S::Published { record, .. }, A::MarkRecordCreated { record_id })
                if record == record_id =>
            {
                Ok(vec![])
            }
            (S::Published { doi: current, .. }, A::MarkIdentifierAssigned { doi })
                if current == doi =>
            {
                Ok(vec![])
            }
            (S::Published { .. }, A::MarkPublished) => Ok(vec![]),
            (
                S::Published {
                    record_published, ..
                },
                A::MarkRecordPublished,
            ) => {
                if *record_published {
                    return Ok(vec![]);
                }
                Ok(vec![ReviewEvent::RecordPublished { review_id }])
            }
            (S::Published { announced, .. }, A::MarkAnnounced) => {
                if *announced {
                    return Ok(vec![]);
                }
                Ok(vec![ReviewEvent::PublicationAnnounced { review_id }])
            }
            (S::Published { .. }, _) => Err(ReviewError::AlreadyPublished),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: &str = "r-1";

    fn by(user: &str, action: ReviewAction) -> ReviewCommand {
        ReviewCommand::new(R, Actor::user(user), action)
    }

    fn system(action: ReviewAction) -> ReviewCommand {
        ReviewCommand::new(R, Actor::System, action)
    }

    fn start() -> ReviewAction {
        ReviewAction::Start {
            preprint: "p-1".into(),
        }
    }

    fn answer(question: Question, text: &str) -> ReviewAction {
        ReviewAction::AnswerQuestion {
            question,
            answer: text.into(),
        }
    }

    fn mark_record(id: &str) -> ReviewAction {
        ReviewAction::MarkRecordCreated {
            record_id: id.into(),
        }
    }

    fn mark_doi(doi: &str) -> ReviewAction {
        ReviewAction::MarkIdentifierAssigned { doi: doi.into() }
    }

    /// 依次执行命令并把产生的事件追加到历史
    fn extend(history: &mut Vec<ReviewEvent>, commands: Vec<ReviewCommand>) {
        for command in commands {
            let state = Review::fold_state(history, R);
            assert!(Review::authorize(&state, &command), "{command:?}");
            history.extend(Review::decide(&state, &command).unwrap());
        }
    }

    fn answered_fully() -> Vec<ReviewEvent> {
        let mut history = Vec::new();
        extend(
            &mut history,
            vec![
                by("u", start()),
                by("u", answer(Question::Summary, "solid")),
                by("u", answer(Question::CompetingInterests, "none")),
                by("u", answer(Question::CodeOfConduct, "yes")),
            ],
        );
        history
    }

    fn publishing() -> Vec<ReviewEvent> {
        let mut history = answered_fully();
        extend(&mut history, vec![by("u", ReviewAction::RequestPublication)]);
        history
    }

    fn published() -> Vec<ReviewEvent> {
        let mut history = publishing();
        extend(
            &mut history,
            vec![
                system(mark_record("rec-1")),
                system(mark_doi("10.5072/1")),
                system(ReviewAction::MarkPublished),
            ],
        );
        history
    }

    fn decide(
        history: &[ReviewEvent],
        command: ReviewCommand,
    ) -> Result<Vec<ReviewEvent>, ReviewError> {
        Review::decide(&Review::fold_state(history, R), &command)
    }

    #[test]
    fn start_moves_to_awaiting_input() {
        let mut history = Vec::new();
        extend(&mut history, vec![by("u", start())]);
        assert_eq!(history.len(), 1);
        assert_eq!(
            Review::fold_state(&history, R),
            ReviewState::AwaitingInput {
                owner: "u".into(),
                preprint: "p-1".into()
            }
        );
    }

    #[test]
    fn fold_is_deterministic_and_ignores_foreign_reviews() {
        let mut history = answered_fully();
        history.insert(
            1,
            ReviewEvent::QuestionAnswered {
                review_id: "other".into(),
                question: Question::Summary,
                answer: "not mine".into(),
            },
        );
        let first = Review::fold_state(&history, R);
        assert_eq!(first, Review::fold_state(&history, R));

        match first {
            ReviewState::Answered { answers, .. } => {
                assert_eq!(answers[&Question::Summary], "solid");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn repeating_the_same_answer_yields_no_events() {
        let mut history = Vec::new();
        extend(
            &mut history,
            vec![by("u", start()), by("u", answer(Question::Summary, "yes"))],
        );

        let same = decide(&history, by("u", answer(Question::Summary, "yes"))).unwrap();
        assert!(same.is_empty());
        let changed = decide(&history, by("u", answer(Question::Summary, "no"))).unwrap();
        assert_eq!(changed.len(), 1);
    }

    #[test]
    fn authorization_compares_actor_with_owner() {
        assert!(Review::authorize(&ReviewState::NotStarted, &by("anyone", start())));

        let state = Review::fold_state(&answered_fully(), R);
        assert!(Review::authorize(&state, &by("u", answer(Question::Summary, "x"))));
        assert!(!Review::authorize(&state, &by("v", answer(Question::Summary, "x"))));
    }

    #[test]
    fn status_advancing_commands_are_reserved_for_the_system() {
        let state = Review::fold_state(&answered_fully(), R);
        assert!(!Review::authorize(&state, &by("u", ReviewAction::MarkPublished)));
        assert!(Review::authorize(&state, &system(ReviewAction::MarkPublished)));
        assert!(!Review::authorize(&state, &system(ReviewAction::RequestPublication)));
        assert!(!Review::authorize(&ReviewState::NotStarted, &system(start())));
    }

    #[test]
    fn publication_requires_every_mandatory_answer() {
        let mut history = Vec::new();
        extend(
            &mut history,
            vec![
                by("u", start()),
                by("u", answer(Question::Methodology, "sound")),
                by("u", answer(Question::CompetingInterests, "none")),
            ],
        );

        let err = decide(&history, by("u", ReviewAction::RequestPublication)).unwrap_err();
        assert_eq!(
            err,
            ReviewError::NotReady {
                missing: vec![Question::Summary, Question::CodeOfConduct]
            }
        );
        assert_eq!(
            err.to_string(),
            "review is not ready to publish, missing: summary, code_of_conduct"
        );
    }

    #[test]
    fn publication_steps_advance_in_order() {
        match Review::fold_state(&published(), R) {
            ReviewState::Published {
                owner, record, doi, ..
            } => {
                assert_eq!(owner, UserId::new("u"));
                assert_eq!(record, RecordId::new("rec-1"));
                assert_eq!(doi, Doi::new("10.5072/1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn steps_out_of_order_are_rejected() {
        assert_eq!(
            decide(&answered_fully(), system(ReviewAction::MarkPublished)),
            Err(ReviewError::PublicationNotRequested)
        );

        let mut history = publishing();
        assert_eq!(
            decide(&history, system(mark_doi("d"))),
            Err(ReviewError::RecordNotCreated)
        );

        extend(&mut history, vec![system(mark_record("rec-1"))]);
        assert_eq!(
            decide(&history, system(ReviewAction::MarkPublished)),
            Err(ReviewError::IdentifierNotAssigned)
        );
        assert_eq!(
            decide(&history, system(mark_record("rec-2"))),
            Err(ReviewError::RecordAlreadyCreated {
                existing: "rec-1".into()
            })
        );
    }

    #[test]
    fn repeated_status_steps_are_idempotent() {
        let mut history = publishing();
        extend(&mut history, vec![system(mark_record("rec-1"))]);
        assert_eq!(decide(&history, system(mark_record("rec-1"))), Ok(vec![]));

        let history = published();
        assert_eq!(decide(&history, system(ReviewAction::MarkPublished)), Ok(vec![]));
        assert_eq!(decide(&history, system(mark_doi("10.5072/1"))), Ok(vec![]));
    }

    #[test]
    fn follow_up_steps_are_recorded_once() {
        let mut history = published();
        let state = Review::fold_state(&history, R);
        assert!(state.has_pending_publication_work());

        extend(&mut history, vec![system(ReviewAction::MarkRecordPublished)]);
        assert_eq!(decide(&history, system(ReviewAction::MarkRecordPublished)), Ok(vec![]));
        assert!(Review::fold_state(&history, R).has_pending_publication_work());

        extend(&mut history, vec![system(ReviewAction::MarkAnnounced)]);
        assert_eq!(decide(&history, system(ReviewAction::MarkAnnounced)), Ok(vec![]));

        match Review::fold_state(&history, R) {
            ReviewState::Published {
                record_published,
                announced,
                ..
            } => assert!(record_published && announced),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!Review::fold_state(&history, R).has_pending_publication_work());
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn follow_up_steps_wait_for_publication() {
        assert_eq!(
            decide(&publishing(), system(ReviewAction::MarkRecordPublished)),
            Err(ReviewError::PublicationInProgress)
        );
        assert_eq!(
            decide(&answered_fully(), system(ReviewAction::MarkAnnounced)),
            Err(ReviewError::PublicationNotRequested)
        );
        assert!(!Review::authorize(
            &Review::fold_state(&published(), R),
            &by("u", ReviewAction::MarkAnnounced)
        ));
    }

    #[test]
    fn publishing_and_published_reject_user_input() {
        let history = publishing();
        assert!(Review::fold_state(&history, R).is_publishing());

        for action in [
            answer(Question::Summary, "late edit"),
            ReviewAction::RequestPublication,
            start(),
        ] {
            assert_eq!(
                decide(&history, by("u", action)),
                Err(ReviewError::PublicationInProgress)
            );
        }

        let history = published();
        assert!(Review::fold_state(&history, R).is_published());
        assert_eq!(
            decide(&history, by("u", answer(Question::Summary, "late edit"))),
            Err(ReviewError::AlreadyPublished)
        );
        assert_eq!(
            decide(&history, system(mark_record("rec-9"))),
            Err(ReviewError::AlreadyPublished)
        );
    }

    #[test]
    fn commands_before_start_are_rejected() {
        assert_eq!(
            decide(&[], by("u", answer(Question::Summary, "x"))),
            Err(ReviewError::NotStarted)
        );

        let mut history = Vec::new();
        extend(&mut history, vec![by("u", start())]);
        assert_eq!(decide(&history, by("u", start())), Err(ReviewError::AlreadyStarted));
    }

    #[test]
    fn payload_carries_review_id_for_filtering() {
        let event = ReviewEvent::PublicationRequested {
            review_id: R.into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "PublicationRequested");
        assert_eq!(value["review_id"], R);
        assert_eq!(Review::filter(R).fields()[0].name, "review_id");
    }
}
