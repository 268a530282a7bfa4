//! 外部协作者
//!
//! 反应工作流调用的窄请求/响应边界：记录仓库、标识符注册、即时通讯通知。
//! 各自的重试与退避策略由实现负责，调度层只做捕获与记录。
//!
//! 内存实现带调用计数与可切换的失败开关，供测试与演示程序使用。
//!
use crate::domain::{Doi, PreprintId, Question, RecordId, ReviewId, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
    #[error("{service} has no record {record_id}")]
    UnknownRecord {
        service: &'static str,
        record_id: RecordId,
    },
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// 提交给记录仓库的评审内容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDraft {
    pub review_id: ReviewId,
    pub preprint: PreprintId,
    pub author: UserId,
    pub answers: BTreeMap<Question, String>,
}

/// 发往通讯频道的结构化消息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub text: String,
    pub link: Option<String>,
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// 创建（未公开的）外部记录
    async fn create_record(
        &self,
        review_id: &ReviewId,
        draft: &RecordDraft,
    ) -> CollaboratorResult<RecordId>;

    /// 公开已创建的记录
    async fn publish_record(&self, record_id: &RecordId) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait IdentifierRegistry: Send + Sync {
    async fn assign(&self, record_id: &RecordId) -> CollaboratorResult<Doi>;
}

#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify(&self, channel: &str, message: ChatMessage) -> CollaboratorResult<()>;
}

/// 工作流所需协作者的集合
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordRepository>,
    pub identifiers: Arc<dyn IdentifierRegistry>,
    pub chat: Arc<dyn ChatNotifier>,
}

/// 可切换的失败开关，另可指定接下来失败的次数
#[derive(Debug, Default)]
struct FailureSwitch {
    always: AtomicBool,
    remaining: AtomicUsize,
}

impl FailureSwitch {
    fn set(&self, failing: bool) {
        self.always.store(failing, Ordering::SeqCst);
    }

    fn fail_next(&self, times: usize) {
        self.remaining.store(times, Ordering::SeqCst);
    }

    fn check(&self, service: &'static str) -> CollaboratorResult<()> {
        let counted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if counted || self.always.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable {
                service,
                reason: "switched off".into(),
            });
        }
        Ok(())
    }
}

/// 内存记录仓库：同一评审重复创建返回同一记录
#[derive(Debug, Default)]
pub struct InMemoryRecordRepository {
    records: DashMap<ReviewId, (RecordId, RecordDraft)>,
    published: DashMap<RecordId, ReviewId>,
    next_record: AtomicUsize,
    create_calls: AtomicUsize,
    publish_calls: AtomicUsize,
    failing: FailureSwitch,
    publish_failing: FailureSwitch,
}

impl InMemoryRecordRepository {
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// 接下来的 `times` 次公开调用失败
    pub fn fail_next_publish(&self, times: usize) {
        self.publish_failing.fail_next(times);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn is_published(&self, record_id: &RecordId) -> bool {
        self.published.contains_key(record_id)
    }

    pub fn draft(&self, review_id: &ReviewId) -> Option<RecordDraft> {
        self.records.get(review_id).map(|entry| entry.1.clone())
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn create_record(
        &self,
        review_id: &ReviewId,
        draft: &RecordDraft,
    ) -> CollaboratorResult<RecordId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.failing.check("record repository")?;

        let entry = self.records.entry(review_id.clone()).or_insert_with(|| {
            let next = self.next_record.fetch_add(1, Ordering::SeqCst) + 1;
            (RecordId::new(format!("rec-{next}")), draft.clone())
        });
        Ok(entry.0.clone())
    }

    async fn publish_record(&self, record_id: &RecordId) -> CollaboratorResult<()> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        self.failing.check("record repository")?;
        self.publish_failing.check("record repository")?;

        let owner = self
            .records
            .iter()
            .find(|entry| entry.value().0 == *record_id)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| CollaboratorError::UnknownRecord {
                service: "record repository",
                record_id: record_id.clone(),
            })?;
        self.published.insert(record_id.clone(), owner);
        Ok(())
    }
}

/// 内存标识符注册：同一记录重复申请返回同一 DOI
#[derive(Debug, Default)]
pub struct InMemoryIdentifierRegistry {
    assigned: DashMap<RecordId, Doi>,
    next_doi: AtomicUsize,
    calls: AtomicUsize,
    failing: FailureSwitch,
}

impl InMemoryIdentifierRegistry {
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentifierRegistry for InMemoryIdentifierRegistry {
    async fn assign(&self, record_id: &RecordId) -> CollaboratorResult<Doi> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failing.check("identifier registry")?;

        let doi = self.assigned.entry(record_id.clone()).or_insert_with(|| {
            let next = self.next_doi.fetch_add(1, Ordering::SeqCst) + 1;
            Doi::new(format!("10.5072/zenodo.{next}"))
        });
        Ok(doi.clone())
    }
}

/// 记录全部已发送消息的通知器
#[derive(Debug, Default)]
pub struct RecordingChatNotifier {
    sent: Mutex<Vec<(String, ChatMessage)>>,
    failing: FailureSwitch,
}

impl RecordingChatNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub async fn sent(&self) -> Vec<(String, ChatMessage)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatNotifier for RecordingChatNotifier {
    async fn notify(&self, channel: &str, message: ChatMessage) -> CollaboratorResult<()> {
        self.failing.check("chat")?;
        tracing::info!(channel, text = %message.text, "chat message sent");
        self.sent.lock().await.push((channel.to_string(), message));
        Ok(())
    }
}

/// 一组共享的内存协作者
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollaborators {
    pub records: Arc<InMemoryRecordRepository>,
    pub identifiers: Arc<InMemoryIdentifierRegistry>,
    pub chat: Arc<RecordingChatNotifier>,
}

impl InMemoryCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            records: self.records.clone(),
            identifiers: self.identifiers.clone(),
            chat: self.chat.clone(),
        }
    }
}
