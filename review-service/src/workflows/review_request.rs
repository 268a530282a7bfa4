//! 评审请求公开后的通知
//!
use crate::collaborators::{ChatMessage, ChatNotifier};
use crate::domain::{
    Actor, Persona, ReviewRequest, ReviewRequestAction, ReviewRequestCommand, ReviewRequestId,
    ReviewRequestState,
};
use anyhow::Context;
use async_trait::async_trait;
use kernel_application::{AppContext, CommandHandler};
use kernel_domain::eventing::{EventHandler, HandledEventType};
use kernel_domain::persist::SerializedEvent;
use std::sync::Arc;

/// 已公开但未通知的请求：发送一次频道消息并记录
pub struct RequestAnnouncement {
    requests: CommandHandler<ReviewRequest>,
    chat: Arc<dyn ChatNotifier>,
    channel: String,
}

impl RequestAnnouncement {
    pub fn new(
        requests: CommandHandler<ReviewRequest>,
        chat: Arc<dyn ChatNotifier>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            requests,
            chat,
            channel: channel.into(),
        }
    }

    /// 返回本次是否发出了通知
    pub async fn announce(
        &self,
        request_id: &ReviewRequestId,
        ctx: &AppContext,
    ) -> anyhow::Result<bool> {
        let state = self
            .requests
            .load_state(request_id.as_str())
            .await
            .context("loading review request")?;

        let ReviewRequestState::Published {
            requester,
            preprint,
            persona,
            announced: false,
        } = state
        else {
            return Ok(false);
        };

        let who = match persona {
            Persona::Public => requester.to_string(),
            Persona::Pseudonym => "A pseudonymous author".to_string(),
        };
        let message = ChatMessage {
            text: format!("{who} is looking for reviews of {preprint}"),
            link: None,
        };
        self.chat
            .notify(&self.channel, message)
            .await
            .context("notifying chat")?;

        let command = ReviewRequestCommand::new(
            request_id.clone(),
            Actor::System,
            ReviewRequestAction::MarkAnnounced,
        );
        self.requests.handle(ctx, command).await?;
        Ok(true)
    }
}

pub struct ReviewRequestReaction {
    announcement: Arc<RequestAnnouncement>,
}

impl ReviewRequestReaction {
    pub fn new(announcement: Arc<RequestAnnouncement>) -> Self {
        Self { announcement }
    }
}

#[async_trait]
impl EventHandler for ReviewRequestReaction {
    fn handler_name(&self) -> &str {
        "review-request-published"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::One("ReviewRequestPublished".into())
    }

    async fn handle(&self, event: &SerializedEvent) -> anyhow::Result<()> {
        let request_id = ReviewRequestId::new(event.aggregate_id());
        let ctx = AppContext::caused_by(event);

        if self.announcement.announce(&request_id, &ctx).await? {
            tracing::info!(request_id = %request_id, "review request announced");
        }
        Ok(())
    }
}
