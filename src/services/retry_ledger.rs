//! 重试账本 - 业务能力层
//!
//! 抽取开始之前先把新的尝试次数写进存储，进程在抽取中途被杀掉也不会少算一次。
//! 是否放弃只看 `attempt >= max_attempts`。

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::result_writer::ResultWriter;
use crate::clients::WorkStore;
use crate::error::{FetchError, StoreError};
use crate::models::{AttemptOutcome, FailureReason, ItemStatus, ItemUpdate, WorkItem};

/// 已持久化的一次尝试
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptTicket {
    pub item_id: String,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl AttemptTicket {
    /// 形如 `fetch_failed (2/3)` 的标签
    pub fn tag(&self, label: &str) -> String {
        format!("{} ({}/{})", label, self.attempt, self.max_attempts)
    }

    pub fn is_last(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[derive(Clone)]
pub struct RetryLedger {
    store: Arc<dyn WorkStore>,
    writer: ResultWriter,
    max_attempts: u32,
}

impl RetryLedger {
    pub fn new(store: Arc<dyn WorkStore>, writer: ResultWriter, max_attempts: u32) -> Self {
        Self {
            store,
            writer,
            max_attempts,
        }
    }

    /// 尝试前的预写：`attempt_count + 1`、`attempting`、`fetch_attempt (n/max)`
    ///
    /// 只有这次写入成功，调用方才可以开始抽取。
    pub async fn begin_attempt(&self, item: &WorkItem) -> Result<AttemptTicket, StoreError> {
        let ticket = AttemptTicket {
            item_id: item.id.clone(),
            attempt: item.attempt_count + 1,
            max_attempts: self.max_attempts,
        };

        let update = ItemUpdate::new()
            .attempt_count(ticket.attempt)
            .status(ItemStatus::Attempting)
            .error(ticket.tag("fetch_attempt"));

        self.store.apply_update(&item.id, &update).await?;
        debug!(
            "[条目 {}] 已记录第 {}/{} 次尝试",
            item.id, ticket.attempt, ticket.max_attempts
        );
        Ok(ticket)
    }

    /// 把抽取结果归类为带标签的结果
    pub fn classify(
        &self,
        ticket: &AttemptTicket,
        result: Result<Option<String>, FetchError>,
    ) -> AttemptOutcome {
        let reason = match result {
            Ok(Some(text)) if !text.trim().is_empty() => {
                return AttemptOutcome::Extracted(text);
            }
            Ok(_) => FailureReason::NoContentExtracted,
            Err(FetchError::NavigationTimeout { .. }) => FailureReason::NavigationTimeout,
            Err(FetchError::Navigation { .. }) | Err(FetchError::PageCreation(_)) => {
                FailureReason::FetchFailed
            }
            Err(FetchError::Script(_)) => FailureReason::ScriptFailed,
        };
        self.failure(ticket, reason)
    }

    /// 失败结果；最后一次尝试失败即放弃
    pub fn failure(&self, ticket: &AttemptTicket, reason: FailureReason) -> AttemptOutcome {
        let tagged = ticket.tag(reason.tag());
        if ticket.is_last() {
            AttemptOutcome::GivenUp(tagged)
        } else {
            AttemptOutcome::Failed(tagged)
        }
    }

    /// 尝试后的第二次写入
    pub async fn record_outcome(
        &self,
        ticket: &AttemptTicket,
        outcome: &AttemptOutcome,
    ) -> Result<(), StoreError> {
        match outcome {
            AttemptOutcome::Extracted(text) => info!(
                "[条目 {}] ✓ 抽取成功 ({} 字符)",
                ticket.item_id,
                text.chars().count()
            ),
            AttemptOutcome::Failed(reason) => {
                warn!("[条目 {}] ⚠️ 抽取失败: {}", ticket.item_id, reason)
            }
            AttemptOutcome::GivenUp(reason) => {
                warn!("[条目 {}] ⛔ 重试次数耗尽，放弃: {}", ticket.item_id, reason)
            }
        }
        self.writer.write(&ticket.item_id, outcome).await
    }
}
