//! 进程内存储，用于测试与本地试运行
//!
//! 与远程存储使用同样的拉取条件和排序，并在写入时校验状态机。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::WorkStore;
use crate::error::StoreError;
use crate::models::{ItemStatus, ItemUpdate, WorkItem};

/// 注入的更新故障
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFailure {
    /// 所有更新都失败
    Always,
    /// 只有写入最终结果（非 `attempting`）的更新失败
    OnOutcome,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, (u64, WorkItem)>,
    next_seq: u64,
    failures: HashMap<String, UpdateFailure>,
    history: HashMap<String, Vec<ItemUpdate>>,
    fetch_unavailable: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序插入，后插入的视为更新近
    pub fn with_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        let mut inner = Inner::default();
        for item in items {
            inner.next_seq += 1;
            inner.items.insert(item.id.clone(), (inner.next_seq, item));
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub async fn insert(&self, item: WorkItem) {
        let mut inner = self.inner.lock().await;
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.items.insert(item.id.clone(), (seq, item));
    }

    pub async fn get(&self, id: &str) -> Option<WorkItem> {
        self.inner
            .lock()
            .await
            .items
            .get(id)
            .map(|(_, item)| item.clone())
    }

    /// 某条目收到的全部成功更新，按时间顺序
    pub async fn history(&self, id: &str) -> Vec<ItemUpdate> {
        self.inner
            .lock()
            .await
            .history
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn fail_updates(&self, id: &str, mode: UpdateFailure) {
        self.inner
            .lock()
            .await
            .failures
            .insert(id.to_string(), mode);
    }

    pub async fn clear_failures(&self) {
        self.inner.lock().await.failures.clear();
    }

    pub async fn set_fetch_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.fetch_unavailable = unavailable;
    }
}

#[async_trait]
impl WorkStore for MemoryStore {
    async fn fetch_pending(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let inner = self.inner.lock().await;
        if inner.fetch_unavailable {
            return Err(StoreError::Unavailable("fetch_pending".into()));
        }

        let mut matching: Vec<&(u64, WorkItem)> = inner
            .items
            .values()
            .filter(|(_, item)| {
                let retryable = match item.last_status {
                    ItemStatus::Pending => true,
                    ItemStatus::Failed | ItemStatus::Attempting => {
                        item.attempt_count < max_attempts
                    }
                    ItemStatus::Extracted | ItemStatus::GivenUp => false,
                };
                retryable && !item.stop_retrying && !item.has_content()
            })
            .collect();

        matching.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn apply_update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.lock().await;

        if let Some(mode) = inner.failures.get(id) {
            let is_outcome = update.last_status != Some(ItemStatus::Attempting);
            if *mode == UpdateFailure::Always || is_outcome {
                return Err(StoreError::Unavailable(format!("update {}", id)));
            }
        }

        let (_, item) = inner
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        if let Some(next) = update.last_status {
            if !item.last_status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: item.last_status.to_string(),
                    to: next.to_string(),
                });
            }
        }

        if update.extracted_content.is_some() && item.has_content() {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: item.last_status.to_string(),
                to: update.last_status.unwrap_or(item.last_status).to_string(),
            });
        }

        item.apply(update);
        inner
            .history
            .entry(id.to_string())
            .or_default()
            .push(update.clone());
        Ok(())
    }
}
