//! 发布工作流
//!
//! `PublicationRequested → RecordCreated → IdentifierAssigned → ReviewPublished
//! → RecordPublished → PublicationAnnounced`
//!
//! 每一步各跨一个调度周期：推进命令提交后，总线把新事件送回本工作流。
//! 每次推进前重新加载状态，已记录的步骤不会再次调用协作者。
//!
use crate::collaborators::{
    ChatMessage, ChatNotifier, Collaborators, IdentifierRegistry, RecordDraft, RecordRepository,
};
use crate::domain::{
    Actor, Doi, RecordId, Review, ReviewAction, ReviewCommand, ReviewId, ReviewState,
};
use anyhow::Context;
use async_trait::async_trait;
use kernel_application::{AppContext, CommandHandler};
use kernel_domain::eventing::{EventHandler, HandledEventType};
use kernel_domain::persist::SerializedEvent;
use std::sync::Arc;

/// 一次推进实际完成的步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicationStep {
    /// 评审不处于发布中，无事可做
    Idle,
    RecordCreated(RecordId),
    IdentifierAssigned(Doi),
    Published,
    RecordPublished,
    Announced,
}

pub struct PublicationWorkflow {
    reviews: CommandHandler<Review>,
    records: Arc<dyn RecordRepository>,
    identifiers: Arc<dyn IdentifierRegistry>,
    chat: Arc<dyn ChatNotifier>,
    channel: String,
}

impl PublicationWorkflow {
    pub fn new(
        reviews: CommandHandler<Review>,
        collaborators: &Collaborators,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            reviews,
            records: collaborators.records.clone(),
            identifiers: collaborators.identifiers.clone(),
            chat: collaborators.chat.clone(),
            channel: channel.into(),
        }
    }

    /// 依据当前状态执行一步
    pub async fn advance(
        &self,
        review_id: &ReviewId,
        ctx: &AppContext,
    ) -> anyhow::Result<PublicationStep> {
        let state = self
            .reviews
            .load_state(review_id.as_str())
            .await
            .context("loading review")?;

        match state {
            ReviewState::Publishing {
                owner,
                preprint,
                answers,
                record: None,
                ..
            } => {
                let draft = RecordDraft {
                    review_id: review_id.clone(),
                    preprint,
                    author: owner,
                    answers,
                };
                let record_id = self
                    .records
                    .create_record(review_id, &draft)
                    .await
                    .context("creating record")?;

                self.mark(
                    ctx,
                    review_id,
                    ReviewAction::MarkRecordCreated {
                        record_id: record_id.clone(),
                    },
                )
                .await?;
                Ok(PublicationStep::RecordCreated(record_id))
            }
            ReviewState::Publishing {
                record: Some(record_id),
                doi: None,
                ..
            } => {
                let doi = self
                    .identifiers
                    .assign(&record_id)
                    .await
                    .context("assigning identifier")?;

                self.mark(
                    ctx,
                    review_id,
                    ReviewAction::MarkIdentifierAssigned { doi: doi.clone() },
                )
                .await?;
                Ok(PublicationStep::IdentifierAssigned(doi))
            }
            ReviewState::Publishing { doi: Some(_), .. } => {
                self.mark(ctx, review_id, ReviewAction::MarkPublished).await?;
                Ok(PublicationStep::Published)
            }
            ReviewState::Published {
                record,
                record_published: false,
                ..
            } => {
                self.records
                    .publish_record(&record)
                    .await
                    .context("publishing record")?;

                self.mark(ctx, review_id, ReviewAction::MarkRecordPublished)
                    .await?;
                Ok(PublicationStep::RecordPublished)
            }
            ReviewState::Published {
                preprint,
                doi,
                announced: false,
                ..
            } => {
                let message = ChatMessage {
                    text: format!("A new review of {preprint} has been published"),
                    link: Some(format!("https://doi.org/{doi}")),
                };
                self.chat
                    .notify(&self.channel, message)
                    .await
                    .context("notifying chat")?;

                self.mark(ctx, review_id, ReviewAction::MarkAnnounced).await?;
                Ok(PublicationStep::Announced)
            }
            _ => Ok(PublicationStep::Idle),
        }
    }

    async fn mark(
        &self,
        ctx: &AppContext,
        review_id: &ReviewId,
        action: ReviewAction,
    ) -> anyhow::Result<()> {
        let command = ReviewCommand::new(review_id.clone(), Actor::System, action);
        self.reviews.handle(ctx, command).await?;
        Ok(())
    }
}

/// 把发布链上的事件交给 `PublicationWorkflow`
pub struct PublicationReaction {
    workflow: Arc<PublicationWorkflow>,
}

impl PublicationReaction {
    pub fn new(workflow: Arc<PublicationWorkflow>) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl EventHandler for PublicationReaction {
    fn handler_name(&self) -> &str {
        "publication"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::Many(vec![
            "PublicationRequested".into(),
            "RecordCreated".into(),
            "IdentifierAssigned".into(),
            "ReviewPublished".into(),
            "RecordPublished".into(),
        ])
    }

    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()> {
        let review_id = ReviewId::new(event.aggregate_id());
        let ctx = AppContext::caused_by(event);

        let step = self.workflow.advance(&review_id, &ctx).await?;
        tracing::info!(
            review_id = %review_id,
            trigger = event.kind(),
            ?step,
            "publication advanced"
        );
        Ok(())
    }
}
