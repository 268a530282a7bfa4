//! 应用生命周期对象
//!
//! 启动时创建事件日志、总线、命令处理器、工作流与事件引擎，关闭时统一回收。
//! 调用方通过 `reviews()` 与 `review_requests()` 门面发出命令，每种命令一个方法。
//!
use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::domain::{
    Actor, PreprintId, Persona, Question, Review, ReviewAction, ReviewCommand, ReviewError,
    ReviewId, ReviewRequest, ReviewRequestAction, ReviewRequestCommand, ReviewRequestError,
    ReviewRequestId, ReviewRequestState, ReviewState, UserId,
};
use crate::reconciliation::{StuckPublicationReconciler, UnannouncedRequestReconciler};
use crate::workflows::{
    PublicationReaction, PublicationWorkflow, RequestAnnouncement, ReviewRequestReaction,
};
use kernel_application::{AppContext, CommandError, CommandHandler};
use kernel_domain::error::KernelResult;
use kernel_domain::eventing::{
    EngineHandle, EventBus, EventEngine, EventHandler, InMemoryEventBus, Reconciler,
};
use kernel_domain::persist::{EventLog, InMemoryEventLog, SerializedEvent};
use std::sync::Arc;

pub type ReviewResult = Result<Vec<SerializedEvent>, CommandError<ReviewError>>;
pub type ReviewRequestResult = Result<Vec<SerializedEvent>, CommandError<ReviewRequestError>>;

pub struct App {
    log: Arc<dyn EventLog>,
    engine: Arc<EventEngine>,
    handle: EngineHandle,
    reviews: ReviewCommands,
    review_requests: ReviewRequestCommands,
}

impl App {
    /// 以内存日志与内存总线启动；须在 tokio 运行时内调用
    pub fn start(config: ServiceConfig, collaborators: Collaborators) -> Self {
        let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new(config.bus()));
        Self::start_with(config, collaborators, log, bus)
    }

    /// 以给定的日志与总线启动
    pub fn start_with(
        config: ServiceConfig,
        collaborators: Collaborators,
        log: Arc<dyn EventLog>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let reviews = CommandHandler::<Review>::new(log.clone(), bus.clone());
        let requests = CommandHandler::<ReviewRequest>::new(log.clone(), bus.clone());

        let publication = Arc::new(PublicationWorkflow::new(
            reviews.clone(),
            &collaborators,
            config.notify_channel.clone(),
        ));
        let announcement = Arc::new(RequestAnnouncement::new(
            requests.clone(),
            collaborators.chat.clone(),
            config.notify_channel.clone(),
        ));

        // 反应与对账共用同一组工作流
        let handlers: Vec<Arc<dyn EventHandler>> = vec![
            Arc::new(PublicationReaction::new(publication.clone())),
            Arc::new(ReviewRequestReaction::new(announcement.clone())),
        ];
        let reconcilers: Vec<Arc<dyn Reconciler>> = vec![
            Arc::new(StuckPublicationReconciler::new(
                log.clone(),
                publication,
                config.stuck_grace,
            )),
            Arc::new(UnannouncedRequestReconciler::new(
                log.clone(),
                announcement,
                config.stuck_grace,
            )),
        ];

        let engine = Arc::new(
            EventEngine::builder()
                .event_bus(bus)
                .event_handlers(handlers)
                .reconcilers(reconcilers)
                .config(config.engine())
                .build(),
        );
        let handle = engine.clone().start();

        tracing::info!(channel = %config.notify_channel, "review service started");

        Self {
            log,
            engine,
            handle,
            reviews: ReviewCommands { handler: reviews },
            review_requests: ReviewRequestCommands { handler: requests },
        }
    }

    pub fn reviews(&self) -> &ReviewCommands {
        &self.reviews
    }

    pub fn review_requests(&self) -> &ReviewRequestCommands {
        &self.review_requests
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    /// 立即运行一轮对账
    pub async fn reconcile_once(&self) {
        self.engine.reconcile_once().await;
    }

    /// 停止全部消费循环与对账任务并等待其结束
    pub async fn shutdown(self) {
        self.handle.shutdown();
        self.handle.join().await;
        tracing::info!("review service stopped");
    }
}

/// 评审命令门面
#[derive(Clone)]
pub struct ReviewCommands {
    handler: CommandHandler<Review>,
}

impl ReviewCommands {
    pub async fn start(
        &self,
        ctx: &AppContext,
        review_id: ReviewId,
        owner: UserId,
        preprint: PreprintId,
    ) -> ReviewResult {
        self.send(ctx, review_id, owner, ReviewAction::Start { preprint })
            .await
    }

    pub async fn answer_question(
        &self,
        ctx: &AppContext,
        review_id: ReviewId,
        actor: UserId,
        question: Question,
        answer: impl Into<String>,
    ) -> ReviewResult {
        let action = ReviewAction::AnswerQuestion {
            question,
            answer: answer.into(),
        };
        self.send(ctx, review_id, actor, action).await
    }

    pub async fn request_publication(
        &self,
        ctx: &AppContext,
        review_id: ReviewId,
        actor: UserId,
    ) -> ReviewResult {
        self.send(ctx, review_id, actor, ReviewAction::RequestPublication)
            .await
    }

    pub async fn state(&self, review_id: &ReviewId) -> KernelResult<ReviewState> {
        self.handler.load_state(review_id.as_str()).await
    }

    async fn send(
        &self,
        ctx: &AppContext,
        review_id: ReviewId,
        actor: UserId,
        action: ReviewAction,
    ) -> ReviewResult {
        let command = ReviewCommand::new(review_id, Actor::User(actor), action);
        self.handler.handle(ctx, command).await
    }
}

/// 评审请求命令门面
#[derive(Clone)]
pub struct ReviewRequestCommands {
    handler: CommandHandler<ReviewRequest>,
}

impl ReviewRequestCommands {
    pub async fn start(
        &self,
        ctx: &AppContext,
        request_id: ReviewRequestId,
        requester: UserId,
        preprint: PreprintId,
    ) -> ReviewRequestResult {
        self.send(ctx, request_id, requester, ReviewRequestAction::Start { preprint })
            .await
    }

    pub async fn choose_persona(
        &self,
        ctx: &AppContext,
        request_id: ReviewRequestId,
        actor: UserId,
        persona: Persona,
    ) -> ReviewRequestResult {
        self.send(ctx, request_id, actor, ReviewRequestAction::ChoosePersona { persona })
            .await
    }

    pub async fn publish(
        &self,
        ctx: &AppContext,
        request_id: ReviewRequestId,
        actor: UserId,
    ) -> ReviewRequestResult {
        self.send(ctx, request_id, actor, ReviewRequestAction::Publish)
            .await
    }

    pub async fn state(&self, request_id: &ReviewRequestId) -> KernelResult<ReviewRequestState> {
        self.handler.load_state(request_id.as_str()).await
    }

    async fn send(
        &self,
        ctx: &AppContext,
        request_id: ReviewRequestId,
        actor: UserId,
        action: ReviewRequestAction,
    ) -> ReviewRequestResult {
        let command = ReviewRequestCommand::new(request_id, Actor::User(actor), action);
        self.handler.handle(ctx, command).await
    }
}
