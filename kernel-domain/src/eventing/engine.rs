//! 事件引擎（EventEngine）
//!
//! 统一编排“订阅 → 反应”与“周期对账”两类长驻任务：
//! - 为每个处理器建立独立订阅，运行单线程消费循环：取一个事件、跑完匹配的工作流、
//!   捕获并记录全部失败（含 panic）、再取下一个；
//! - 周期运行对账器，失败仅记录，调度不中断；耗时过长的一轮由下一轮取代，不在中途重试；
//! - 提供关闭与等待的 `EngineHandle`。
//!
use super::{EventBus, EventHandler, Reconciler};
use crate::persist::SerializedEvent;
use bon::Builder;
use futures_core::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// EventEngine：
/// - 每个 Handler 一个订阅与一个消费循环
/// - 一个周期任务依次运行所有 Reconciler
#[derive(Builder)]
pub struct EventEngine {
    event_bus: Arc<dyn EventBus>,
    #[builder(default)]
    event_handlers: Vec<Arc<dyn EventHandler>>,
    #[builder(default)]
    reconcilers: Vec<Arc<dyn Reconciler>>,
    #[builder(default)]
    config: EventEngineConfig,
}

impl EventEngine {
    /// 启动事件引擎，返回可用于关闭/等待的句柄
    ///
    /// 订阅在本方法返回前完成注册，此后提交的事件不会被遗漏。
    pub fn start(self: Arc<Self>) -> EngineHandle {
        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(self.event_handlers.len() + 1);

        // dispatch worker（每个处理器一个长循环）
        for handler in &self.event_handlers {
            let stream = self.event_bus.subscribe();
            tasks.push(tokio::spawn(Self::dispatch_loop(
                handler.clone(),
                stream,
                token.clone(),
            )));
        }

        // reconcile worker（周期任务）
        if !self.reconcilers.is_empty() {
            let engine = self.clone();
            let interval = self.config.reconcile_interval;

            tasks.push(Self::spawn_periodic(token.clone(), interval, move || {
                let engine = engine.clone();
                async move { engine.reconcile_once().await }
            }));
        }

        tracing::info!(
            handlers = self.event_handlers.len(),
            reconcilers = self.reconcilers.len(),
            "event engine started"
        );

        EngineHandle { token, tasks }
    }

    /// 立即运行一轮对账（与周期任务相同的逻辑）
    pub async fn reconcile_once(&self) {
        for reconciler in &self.reconcilers {
            let name = reconciler.name();
            match AssertUnwindSafe(reconciler.reconcile()).catch_unwind().await {
                Ok(Ok(0)) => tracing::debug!(reconciler = name, "nothing to reconcile"),
                Ok(Ok(n)) => tracing::info!(reconciler = name, repaired = n, "reconciled"),
                Ok(Err(err)) => {
                    tracing::error!(reconciler = name, error = ?err, "reconciliation failed")
                }
                Err(_) => tracing::error!(reconciler = name, "reconciliation panicked"),
            }
        }
    }

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }

    async fn dispatch_loop(
        handler: Arc<dyn EventHandler>,
        mut stream: BoxStream<'static, SerializedEvent>,
        token: CancellationToken,
    ) {
        let handled = handler.handled_event_type();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    break;
                }
                maybe_event = stream.next() => {
                    match maybe_event {
                        Some(event) => {
                            if handled.matches(event.kind()) {
                                Self::dispatch_one(handler.as_ref(), &event).await;
                            }
                        }
                        None => {
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch_one(handler: &dyn EventHandler, event: &SerializedEvent) {
        let name = handler.handler_name();
        let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(
                    handler = name,
                    event_id = event.event_id(),
                    kind = event.kind(),
                    "event handled"
                );
            }
            Ok(Err(err)) => {
                tracing::error!(
                    handler = name,
                    event_id = event.event_id(),
                    kind = event.kind(),
                    aggregate_id = event.aggregate_id(),
                    error = ?err,
                    "event handler failed"
                );
            }
            Err(_) => {
                tracing::error!(
                    handler = name,
                    event_id = event.event_id(),
                    kind = event.kind(),
                    aggregate_id = event.aggregate_id(),
                    "event handler panicked"
                );
            }
        }
    }
}

/// 事件引擎配置
#[derive(Clone, Copy, Debug)]
pub struct EventEngineConfig {
    /// 对账间隔（首轮在启动时立即执行）
    pub reconcile_interval: Duration,
}

impl Default for EventEngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(60),
        }
    }
}

/// 引擎运行句柄：用于优雅关闭与等待任务结束
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
