//! 结果写入 - 业务能力层
//!
//! 把一次尝试的结果转换成存储更新并写回。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use super::outcome_journal::{JournalEntry, OutcomeJournal};
use crate::clients::WorkStore;
use crate::error::StoreError;
use crate::models::{AttemptOutcome, ItemStatus, ItemUpdate};

#[derive(Clone)]
pub struct ResultWriter {
    store: Arc<dyn WorkStore>,
    journal: Option<Arc<OutcomeJournal>>,
}

impl ResultWriter {
    pub fn new(store: Arc<dyn WorkStore>) -> Self {
        Self {
            store,
            journal: None,
        }
    }

    /// 写存储失败时把更新落到本地日志
    pub fn with_journal(mut self, journal: Arc<OutcomeJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// 结果对应的更新：总是带 `processed_at`，放弃时置 `stop_retrying`
    ///
    /// 空白正文在 `RetryLedger::classify` 中已归为 `no_content` 失败。
    pub fn outcome_update(outcome: &AttemptOutcome, now: DateTime<Utc>) -> ItemUpdate {
        let update = ItemUpdate::new().processed_at(now);
        match outcome {
            AttemptOutcome::Extracted(text) => update
                .status(ItemStatus::Extracted)
                .content(text.as_str())
                .clear_error(),
            AttemptOutcome::Failed(reason) => {
                update.status(ItemStatus::Failed).error(reason.as_str())
            }
            AttemptOutcome::GivenUp(reason) => update
                .status(ItemStatus::GivenUp)
                .error(reason.as_str())
                .stop_retrying(true),
        }
    }

    pub async fn write(&self, id: &str, outcome: &AttemptOutcome) -> Result<(), StoreError> {
        let update = Self::outcome_update(outcome, Utc::now());
        match self.store.apply_update(id, &update).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("[条目 {}] ❌ 结果写回失败: {}", id, e);
                self.journal_unflushed(id, update).await;
                Err(e)
            }
        }
    }

    async fn journal_unflushed(&self, id: &str, update: ItemUpdate) {
        let Some(journal) = &self.journal else {
            warn!("[条目 {}] 未配置结果日志，本次结果丢失", id);
            return;
        };
        let entry = JournalEntry {
            id: id.to_string(),
            update,
            recorded_at: Utc::now(),
        };
        match journal.append(&entry).await {
            Ok(()) => warn!(
                "[条目 {}] 结果已暂存到 {}，下次运行补写",
                id,
                journal.path().display()
            ),
            Err(e) => error!("[条目 {}] 写入结果日志失败，本次结果丢失: {}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MemoryStore, UpdateFailure};
    use crate::models::WorkItem;

    #[test]
    fn extracted_sets_content_and_clears_error() {
        let now = Utc::now();
        let update = ResultWriter::outcome_update(&AttemptOutcome::Extracted("正文".into()), now);
        assert_eq!(update.last_status, Some(ItemStatus::Extracted));
        assert_eq!(update.extracted_content.as_deref(), Some("正文"));
        assert_eq!(update.last_error, Some(None));
        assert_eq!(update.processed_at, Some(now));
        assert_eq!(update.stop_retrying, None);
    }

    #[test]
    fn failure_never_touches_content() {
        let update = ResultWriter::outcome_update(
            &AttemptOutcome::Failed("fetch_failed (1/3)".into()),
            Utc::now(),
        );
        assert_eq!(update.extracted_content, None);
        assert_eq!(update.last_status, Some(ItemStatus::Failed));
        assert_eq!(update.stop_retrying, None);
        assert!(update.processed_at.is_some());
    }

    #[test]
    fn give_up_signals_stop_retrying() {
        let update = ResultWriter::outcome_update(
            &AttemptOutcome::GivenUp("navigation_timeout (3/3)".into()),
            Utc::now(),
        );
        assert_eq!(update.last_status, Some(ItemStatus::GivenUp));
        assert_eq!(update.stop_retrying, Some(true));
    }

    #[tokio::test]
    async fn failed_write_lands_in_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(OutcomeJournal::new(dir.path().join("j.jsonl")));

        let mut item = WorkItem::pending("a", "https://news.example/a");
        item.last_status = ItemStatus::Attempting;
        item.attempt_count = 1;
        let store = Arc::new(MemoryStore::with_items([item]));
        store.fail_updates("a", UpdateFailure::OnOutcome).await;

        let writer = ResultWriter::new(store.clone()).with_journal(journal.clone());
        let result = writer
            .write("a", &AttemptOutcome::Extracted("body".into()))
            .await;

        assert!(result.is_err());
        let entries = journal.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].update.extracted_content.as_deref(), Some("body"));
    }
}
