//! 对账
//!
//! 扫描事件日志，找出停在可推进状态且最近一次事件早于宽限期的聚合，
//! 对每个聚合调用一次与反应调度相同的步骤。后续步骤由总线继续推进，
//! 本轮不会在同一聚合上连续执行多步。
//!
//! - 评审：`Publishing`，或已发布但记录未公开 / 未通知
//! - 评审请求：已公开但未通知
//!
use crate::domain::{
    Review, ReviewEvent, ReviewId, ReviewRequest, ReviewRequestEvent, ReviewRequestId,
};
use crate::workflows::{PublicationStep, PublicationWorkflow, RequestAnnouncement};
use async_trait::async_trait;
use chrono::Utc;
use kernel_application::AppContext;
use kernel_domain::aggregate::Aggregate;
use kernel_domain::domain_event::{DomainEvent, EventContext};
use kernel_domain::eventing::Reconciler;
use kernel_domain::persist::{EventLog, SerializedEvent, decode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// 按聚合分组并还原历史，跳过最近仍有事件写入的聚合
///
/// 无法还原的历史只记录错误并跳过，不影响其余聚合。
async fn quiet_histories<E: DomainEvent>(
    log: &dyn EventLog,
    grace: Duration,
) -> anyhow::Result<Vec<(String, Vec<E>)>> {
    let events = log.query_all(E::KINDS).await?;

    let mut by_aggregate: BTreeMap<&str, Vec<SerializedEvent>> = BTreeMap::new();
    for event in &events {
        by_aggregate
            .entry(event.aggregate_id())
            .or_default()
            .push(event.clone());
    }

    let now = Utc::now();
    let mut quiet = Vec::new();
    for (aggregate_id, history) in by_aggregate {
        let Some(last) = history.last() else {
            continue;
        };
        let quiet_for = (now - last.occurred_at()).to_std().unwrap_or_default();
        if quiet_for < grace {
            continue;
        }

        match decode::<E>(&history) {
            Ok(envelopes) => {
                let typed = envelopes.into_iter().map(|envelope| envelope.event).collect();
                quiet.push((aggregate_id.to_string(), typed));
            }
            Err(err) => {
                tracing::error!(aggregate_id, error = %err, "history cannot be decoded, skipped");
            }
        }
    }
    Ok(quiet)
}

fn reconcile_context(aggregate_id: &str) -> AppContext {
    AppContext {
        biz: EventContext::builder()
            .correlation_id(format!("reconcile-{aggregate_id}"))
            .build(),
    }
}

pub struct StuckPublicationReconciler {
    log: Arc<dyn EventLog>,
    workflow: Arc<PublicationWorkflow>,
    grace: Duration,
}

impl StuckPublicationReconciler {
    pub fn new(
        log: Arc<dyn EventLog>,
        workflow: Arc<PublicationWorkflow>,
        grace: Duration,
    ) -> Self {
        Self {
            log,
            workflow,
            grace,
        }
    }

    /// 发布流程未走完且超过宽限期的评审
    pub async fn stuck_reviews(&self) -> anyhow::Result<Vec<ReviewId>> {
        let histories = quiet_histories::<ReviewEvent>(self.log.as_ref(), self.grace).await?;
        Ok(histories
            .into_iter()
            .filter(|(id, events)| Review::fold_state(events, id).has_pending_publication_work())
            .map(|(id, _)| ReviewId::new(id))
            .collect())
    }
}

#[async_trait]
impl Reconciler for StuckPublicationReconciler {
    fn name(&self) -> &str {
        "stuck-publication"
    }

    async fn reconcile(&self) -> anyhow::Result<usize> {
        let stuck = self.stuck_reviews().await?;
        let mut repaired = 0;

        for review_id in stuck {
            let ctx = reconcile_context(review_id.as_str());
            // 单个评审失败不影响其他评审
            match self.workflow.advance(&review_id, &ctx).await {
                Ok(PublicationStep::Idle) => {}
                Ok(step) => {
                    tracing::info!(review_id = %review_id, ?step, "stuck publication resumed");
                    repaired += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        review_id = %review_id,
                        error = ?err,
                        "stuck publication still failing"
                    );
                }
            }
        }
        Ok(repaired)
    }
}

pub struct UnannouncedRequestReconciler {
    log: Arc<dyn EventLog>,
    announcement: Arc<RequestAnnouncement>,
    grace: Duration,
}

impl UnannouncedRequestReconciler {
    pub fn new(
        log: Arc<dyn EventLog>,
        announcement: Arc<RequestAnnouncement>,
        grace: Duration,
    ) -> Self {
        Self {
            log,
            announcement,
            grace,
        }
    }

    pub async fn unannounced_requests(&self) -> anyhow::Result<Vec<ReviewRequestId>> {
        let histories =
            quiet_histories::<ReviewRequestEvent>(self.log.as_ref(), self.grace).await?;
        Ok(histories
            .into_iter()
            .filter(|(id, events)| ReviewRequest::fold_state(events, id).awaits_announcement())
            .map(|(id, _)| ReviewRequestId::new(id))
            .collect())
    }
}

#[async_trait]
impl Reconciler for UnannouncedRequestReconciler {
    fn name(&self) -> &str {
        "unannounced-request"
    }

    async fn reconcile(&self) -> anyhow::Result<usize> {
        let mut repaired = 0;
        for request_id in self.unannounced_requests().await? {
            let ctx = reconcile_context(request_id.as_str());
            match self.announcement.announce(&request_id, &ctx).await {
                Ok(true) => {
                    tracing::info!(request_id = %request_id, "missed announcement sent");
                    repaired += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        request_id = %request_id,
                        error = ?err,
                        "announcement still failing"
                    );
                }
            }
        }
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryCollaborators;
    use crate::domain::{Actor, Question, ReviewAction, ReviewCommand};
    use kernel_application::CommandHandler;
    use kernel_domain::eventing::{BusConfig, InMemoryEventBus};
    use kernel_domain::persist::{AppendCondition, EventFilter, InMemoryEventLog, encode};
    use serde::{Deserialize, Serialize};

    /// 与 `ReviewStarted` 同名但缺少字段的事件
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    enum Truncated {
        ReviewStarted { review_id: String },
    }

    impl DomainEvent for Truncated {
        const KINDS: &'static [&'static str] = &["ReviewStarted"];

        fn kind(&self) -> &'static str {
            "ReviewStarted"
        }

        fn aggregate_id(&self) -> &str {
            match self {
                Self::ReviewStarted { review_id } => review_id,
            }
        }
    }

    async fn publishing(reviews: &CommandHandler<Review>, id: &str) {
        let ctx = AppContext::default();
        let mut actions = vec![ReviewAction::Start {
            preprint: "p-1".into(),
        }];
        for question in [Question::Summary, Question::CompetingInterests, Question::CodeOfConduct] {
            actions.push(ReviewAction::AnswerQuestion {
                question,
                answer: "yes".into(),
            });
        }
        actions.push(ReviewAction::RequestPublication);
        for action in actions {
            reviews
                .handle(&ctx, ReviewCommand::new(id, Actor::user("u-1"), action))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn undecodable_history_does_not_block_other_reviews() {
        let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));
        let reviews = CommandHandler::<Review>::new(log.clone(), bus);

        let broken = encode(
            Review::TYPE,
            &[Truncated::ReviewStarted {
                review_id: "a-broken".into(),
            }],
            &EventContext::default(),
        )
        .unwrap();
        let nothing = EventFilter::kinds(["Nothing"]);
        log.append(broken, AppendCondition::new(nothing, None)).await.unwrap();
        publishing(&reviews, "b-stuck").await;

        let fakes = InMemoryCollaborators::new();
        let workflow = Arc::new(PublicationWorkflow::new(
            reviews.clone(),
            &fakes.collaborators(),
            "reviews",
        ));
        let reconciler = StuckPublicationReconciler::new(log, workflow, Duration::ZERO);

        let stuck = reconciler.stuck_reviews().await.unwrap();
        assert_eq!(stuck, vec![ReviewId::new("b-stuck")]);
        assert_eq!(reconciler.reconcile().await.unwrap(), 1);
        assert_eq!(fakes.records.create_calls(), 1);
    }

    #[tokio::test]
    async fn recent_activity_is_left_to_the_dispatch_loop() {
        let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));
        let reviews = CommandHandler::<Review>::new(log.clone(), bus);
        publishing(&reviews, "r-1").await;

        let fakes = InMemoryCollaborators::new();
        let workflow = Arc::new(PublicationWorkflow::new(
            reviews,
            &fakes.collaborators(),
            "reviews",
        ));
        let reconciler =
            StuckPublicationReconciler::new(log, workflow, Duration::from_secs(3600));

        assert!(reconciler.stuck_reviews().await.unwrap().is_empty());
        assert_eq!(reconciler.reconcile().await.unwrap(), 0);
        assert_eq!(fakes.records.create_calls(), 0);
    }
}
