//! 通用命令处理器（CommandHandler）
//!
//! 以聚合的（filter, fold_state, authorize, decide）四元组为参数，编排一条命令：
//! 1. 由目标 ID 构造过滤器并查询日志；
//! 2. 折叠为状态，基于命令执行前的状态授权；
//! 3. 调用 `decide`，无事件则成功返回且不写入；
//! 4. 以查询时的过滤器与位点条件追加（每条命令恰好一次追加或零次）；
//! 5. 提交成功后再发布到总线，订阅者不会先于日志查询看到事件。
//!
//! 并发冲突不自动重试，避免在过期假设上重复执行授权与业务逻辑。
//!
use crate::{command::Command, context::AppContext, error::CommandError};
use kernel_domain::{
    aggregate::Aggregate, aggregate_root::AggregateRoot, error::KernelResult,
    eventing::EventBus, persist::EventLog, persist::SerializedEvent,
};
use std::sync::Arc;
use tracing::Instrument;

pub struct CommandHandler<A>
where
    A: Aggregate,
{
    root: AggregateRoot<A>,
    bus: Arc<dyn EventBus>,
}

impl<A> Clone for CommandHandler<A>
where
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            bus: Arc::clone(&self.bus),
        }
    }
}

impl<A> CommandHandler<A>
where
    A: Aggregate,
    A::Command: Command,
{
    pub fn new(log: Arc<dyn EventLog>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            root: AggregateRoot::new(log),
            bus,
        }
    }

    /// 处理命令，返回本次提交的事件（无状态变化时为空）
    ///
    /// 事件在日志写锁释放后才发布到总线。同一批次内保持提交顺序，
    /// 但两个并发提交（即使属于同一聚合）到达订阅者的顺序可能与日志位点相反。
    /// 订阅者应以 `SerializedEvent::position` 或重新加载的聚合状态为准，
    /// 不能依赖投递顺序推断当前状态。
    pub async fn handle(
        &self,
        ctx: &AppContext,
        command: A::Command,
    ) -> Result<Vec<SerializedEvent>, CommandError<A::Error>> {
        let span = tracing::info_span!(
            "command",
            command = command.name(),
            aggregate_type = A::TYPE,
            aggregate_id = command.aggregate_id(),
        );

        self.run(ctx, command).instrument(span).await
    }

    /// 只读加载聚合当前状态
    pub async fn load_state(&self, aggregate_id: &str) -> KernelResult<A::State> {
        Ok(self.root.load(aggregate_id).await?.state)
    }

    async fn run(
        &self,
        ctx: &AppContext,
        command: A::Command,
    ) -> Result<Vec<SerializedEvent>, CommandError<A::Error>> {
        let loaded = self
            .root
            .load(command.aggregate_id())
            .await
            .map_err(CommandError::UnableToHandleCommand)?;

        if !A::authorize(&loaded.state, &command) {
            tracing::warn!(actor = %command.actor_id(), "command not authorized");
            return Err(CommandError::NotAuthorizedToRunCommand {
                command: command.name(),
            });
        }

        let events = A::decide(&loaded.state, &command).map_err(CommandError::Domain)?;

        if events.is_empty() {
            tracing::debug!("command produced no change");
            return Ok(Vec::new());
        }

        let context = ctx.biz.clone().with_actor(command.actor_id());
        let committed = self
            .root
            .commit(&loaded, &events, &context)
            .await
            .map_err(|err| {
                if err.is_concurrency_conflict() {
                    tracing::warn!(error = %err, "command lost a concurrent write");
                } else {
                    tracing::error!(error = %err, "event log append failed");
                }
                CommandError::UnableToHandleCommand(err)
            })?;

        tracing::debug!(events = committed.len(), "events committed");

        // 已提交的事件不回滚；漏发布由对账补偿
        if let Err(err) = self.bus.publish_batch(&committed).await {
            tracing::warn!(error = %err, "committed events were not published");
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use kernel_domain::domain_event::{DomainEvent, EventContext};
    use kernel_domain::error::KernelError;
    use kernel_domain::eventing::{BusConfig, InMemoryEventBus};
    use kernel_domain::persist::{
        AppendCondition, EventFilter, InMemoryEventLog, QueryResult,
    };
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind")]
    enum NoteEvent {
        NoteCreated { note_id: String, author: String },
        NoteEdited { note_id: String, text: String },
    }

    impl DomainEvent for NoteEvent {
        const KINDS: &'static [&'static str] = &["NoteCreated", "NoteEdited"];

        fn kind(&self) -> &'static str {
            match self {
                Self::NoteCreated { .. } => "NoteCreated",
                Self::NoteEdited { .. } => "NoteEdited",
            }
        }

        fn aggregate_id(&self) -> &str {
            match self {
                Self::NoteCreated { note_id, .. } | Self::NoteEdited { note_id, .. } => note_id,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum NoteState {
        Missing,
        Written { author: String, text: String },
    }

    #[derive(Debug)]
    struct NoteCommand {
        note_id: String,
        actor: String,
        text: Option<String>,
    }

    impl Command for NoteCommand {
        fn name(&self) -> &'static str {
            if self.text.is_some() { "EditNote" } else { "CreateNote" }
        }
        fn aggregate_id(&self) -> &str {
            &self.note_id
        }
        fn actor_id(&self) -> String {
            self.actor.clone()
        }
    }

    #[derive(Debug, PartialEq, thiserror::Error)]
    enum NoteError {
        #[error("note does not exist")]
        Missing,
        #[error("note already exists")]
        Exists,
    }

    struct Note;

    impl Aggregate for Note {
        const TYPE: &'static str = "note";
        type Event = NoteEvent;
        type State = NoteState;
        type Command = NoteCommand;
        type Error = NoteError;

        fn filter(aggregate_id: &str) -> EventFilter {
            EventFilter::kinds(NoteEvent::KINDS.iter().copied()).with_field("note_id", aggregate_id)
        }

        fn fold_state(events: &[NoteEvent], aggregate_id: &str) -> NoteState {
            let mut state = NoteState::Missing;
            for event in events.iter().filter(|e| e.aggregate_id() == aggregate_id) {
                state = match (state, event) {
                    (NoteState::Missing, NoteEvent::NoteCreated { author, .. }) => {
                        NoteState::Written {
                            author: author.clone(),
                            text: String::new(),
                        }
                    }
                    (NoteState::Written { author, .. }, NoteEvent::NoteEdited { text, .. }) => {
                        NoteState::Written {
                            author,
                            text: text.clone(),
                        }
                    }
                    (state, _) => state,
                };
            }
            state
        }

        fn authorize(state: &NoteState, command: &NoteCommand) -> bool {
            match state {
                NoteState::Missing => true,
                NoteState::Written { author, .. } => *author == command.actor,
            }
        }

        fn decide(state: &NoteState, command: &NoteCommand) -> Result<Vec<NoteEvent>, NoteError> {
            match (state, &command.text) {
                (NoteState::Missing, None) => Ok(vec![NoteEvent::NoteCreated {
                    note_id: command.note_id.clone(),
                    author: command.actor.clone(),
                }]),
                (NoteState::Missing, Some(_)) => Err(NoteError::Missing),
                (NoteState::Written { .. }, None) => Err(NoteError::Exists),
                (NoteState::Written { text, .. }, Some(wanted)) if text == wanted => Ok(vec![]),
                (NoteState::Written { .. }, Some(wanted)) => Ok(vec![NoteEvent::NoteEdited {
                    note_id: command.note_id.clone(),
                    text: wanted.clone(),
                }]),
            }
        }
    }

    fn create(actor: &str) -> NoteCommand {
        NoteCommand {
            note_id: "n-1".into(),
            actor: actor.into(),
            text: None,
        }
    }

    fn edit(actor: &str, text: &str) -> NoteCommand {
        NoteCommand {
            note_id: "n-1".into(),
            actor: actor.into(),
            text: Some(text.into()),
        }
    }

    fn setup() -> (Arc<InMemoryEventLog>, Arc<InMemoryEventBus>, CommandHandler<Note>) {
        let log = Arc::new(InMemoryEventLog::new());
        let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));
        let handler = CommandHandler::<Note>::new(log.clone(), bus.clone());
        (log, bus, handler)
    }

    #[tokio::test]
    async fn commits_and_publishes_decided_events() {
        let (log, bus, handler) = setup();
        let mut sub = bus.subscribe();
        let ctx = AppContext {
            biz: EventContext::builder()
                .correlation_id("cor-1".to_string())
                .build(),
        };

        let committed = handler.handle(&ctx, create("u-1")).await.unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].context().actor_id(), Some("u-1"));
        assert_eq!(committed[0].context().correlation_id(), Some("cor-1"));

        let delivered = sub.next().await.unwrap();
        assert_eq!(delivered.event_id(), committed[0].event_id());
        // 订阅者收到事件时，日志查询必然可见
        let visible = log.query(&Note::filter("n-1")).await.unwrap();
        assert!(visible.events.iter().any(|e| e.event_id() == delivered.event_id()));

        assert_eq!(
            handler.load_state("n-1").await.unwrap(),
            NoteState::Written {
                author: "u-1".into(),
                text: String::new()
            }
        );
    }

    #[tokio::test]
    async fn unchanged_value_succeeds_without_write() {
        let (log, _bus, handler) = setup();
        let ctx = AppContext::default();
        handler.handle(&ctx, create("u-1")).await.unwrap();
        handler.handle(&ctx, edit("u-1", "hello")).await.unwrap();

        let repeated = handler.handle(&ctx, edit("u-1", "hello")).await.unwrap();
        assert!(repeated.is_empty());
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn foreign_actor_is_rejected_before_decide() {
        let (log, _bus, handler) = setup();
        let ctx = AppContext::default();
        handler.handle(&ctx, create("u-1")).await.unwrap();

        let err = handler.handle(&ctx, edit("u-2", "mine now")).await.unwrap_err();
        assert!(!err.is_retryable());
        match err {
            CommandError::NotAuthorizedToRunCommand { command } => assert_eq!(command, "EditNote"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn domain_errors_are_surfaced_verbatim() {
        let (_log, _bus, handler) = setup();
        let err = handler
            .handle(&AppContext::default(), edit("u-1", "text"))
            .await
            .unwrap_err();
        assert_eq!(err.domain(), Some(&NoteError::Missing));
    }

    /// 在查询与追加之间插入一次竞争写入的日志
    struct RacingLog {
        inner: InMemoryEventLog,
    }

    #[async_trait]
    impl EventLog for RacingLog {
        async fn query(&self, filter: &EventFilter) -> KernelResult<QueryResult> {
            self.inner.query(filter).await
        }

        async fn query_all(&self, kinds: &[&str]) -> KernelResult<Vec<SerializedEvent>> {
            self.inner.query_all(kinds).await
        }

        async fn append(
            &self,
            events: Vec<SerializedEvent>,
            condition: AppendCondition,
        ) -> KernelResult<Vec<SerializedEvent>> {
            let intruder = kernel_domain::persist::encode(
                Note::TYPE,
                &[NoteEvent::NoteEdited {
                    note_id: "n-1".into(),
                    text: "sneaky".into(),
                }],
                &EventContext::default(),
            )?;
            self.inner
                .append(intruder, AppendCondition::new(EventFilter::kinds(["None"]), None))
                .await?;
            self.inner.append(events, condition).await
        }
    }

    #[tokio::test]
    async fn concurrent_write_surfaces_a_retryable_error() {
        let log = Arc::new(RacingLog {
            inner: InMemoryEventLog::new(),
        });
        let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));
        let handler = CommandHandler::<Note>::new(log.clone(), bus);

        let err = handler
            .handle(&AppContext::default(), create("u-1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        match err {
            CommandError::UnableToHandleCommand(KernelError::ConcurrencyConflict { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        // 只有竞争者的事件被记录
        assert_eq!(log.inner.len().await, 1);
    }

    struct BrokenLog;

    #[async_trait]
    impl EventLog for BrokenLog {
        async fn query(&self, _filter: &EventFilter) -> KernelResult<QueryResult> {
            Err(KernelError::event_log("connection refused"))
        }

        async fn query_all(&self, _kinds: &[&str]) -> KernelResult<Vec<SerializedEvent>> {
            Err(KernelError::event_log("connection refused"))
        }

        async fn append(
            &self,
            _events: Vec<SerializedEvent>,
            _condition: AppendCondition,
        ) -> KernelResult<Vec<SerializedEvent>> {
            Err(KernelError::event_log("connection refused"))
        }
    }

    #[tokio::test]
    async fn store_failures_are_wrapped_and_not_retryable() {
        let bus = Arc::new(InMemoryEventBus::new(BusConfig::default()));
        let handler = CommandHandler::<Note>::new(Arc::new(BrokenLog), bus);

        let err = handler
            .handle(&AppContext::default(), create("u-1"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(
            err,
            CommandError::UnableToHandleCommand(KernelError::EventLog { .. })
        ));
    }

    #[test]
    fn caused_by_chains_correlation_and_causation() {
        let raw = kernel_domain::persist::encode(
            Note::TYPE,
            &[NoteEvent::NoteCreated {
                note_id: "n-1".into(),
                author: "u-1".into(),
            }],
            &EventContext::builder()
                .correlation_id("cor-9".to_string())
                .build(),
        )
        .unwrap()
        .remove(0);

        let ctx = AppContext::caused_by(&raw);
        assert_eq!(ctx.biz.correlation_id(), Some("cor-9"));
        assert_eq!(ctx.biz.causation_id(), Some(raw.event_id()));
    }
}
