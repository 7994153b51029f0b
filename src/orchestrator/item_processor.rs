//! 单个条目处理器 - 编排层
//!
//! ## 流程
//!
//! 1. 已有正文的条目直接跳过，不写账本
//! 2. 账本预写（尝试次数 +1，状态 `attempting`）
//! 3. 渲染页面并抽取正文，页面 panic 或超时都折算成失败结果
//! 4. 账本写入最终结果

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::error::FetchError;
use crate::extract::{extract_text, SkipRules};
use crate::infrastructure::PageRenderer;
use crate::models::{AttemptOutcome, FailureReason, WorkItem};
use crate::services::RetryLedger;

/// 单个条目在本次运行中的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemResult {
    Succeeded,
    Failed,
    Skipped,
}

pub struct ItemProcessor {
    ledger: RetryLedger,
    rules: SkipRules,
    max_chars: usize,
    deadline: Duration,
}

impl ItemProcessor {
    /// `deadline` 是单个条目从渲染到快照的总时限
    pub fn new(ledger: RetryLedger, rules: SkipRules, max_chars: usize, deadline: Duration) -> Self {
        Self {
            ledger,
            rules,
            max_chars,
            deadline,
        }
    }

    pub async fn process(&self, item: WorkItem, renderer: &dyn PageRenderer) -> ItemResult {
        if item.has_content() {
            info!("[条目 {}] 已有正文，跳过", item.id);
            return ItemResult::Skipped;
        }
        if item.last_status.is_terminal() || item.stop_retrying {
            info!("[条目 {}] 状态为 {}，跳过", item.id, item.last_status);
            return ItemResult::Skipped;
        }

        let ticket = match self.ledger.begin_attempt(&item).await {
            Ok(ticket) => ticket,
            Err(e) => {
                error!("[条目 {}] ❌ 尝试前记录失败，本次不抽取: {}", item.id, e);
                return ItemResult::Failed;
            }
        };

        info!(
            "[条目 {}] 🔍 第 {}/{} 次抓取: {}",
            item.id, ticket.attempt, ticket.max_attempts, item.source_url
        );

        let rendered = AssertUnwindSafe(timeout(self.deadline, renderer.render(&item.source_url)))
            .catch_unwind()
            .await;

        let outcome = match rendered {
            Ok(Ok(result)) => {
                let extracted = result.map(|dom| extract_text(&dom, &self.rules, self.max_chars));
                self.ledger.classify(&ticket, extracted)
            }
            Ok(Err(_elapsed)) => self.ledger.classify(
                &ticket,
                Err(FetchError::NavigationTimeout {
                    url: item.source_url.clone(),
                    timeout_ms: self.deadline.as_millis() as u64,
                }),
            ),
            Err(_panic) => {
                error!("[条目 {}] ❌ 抓取任务异常中止", item.id);
                self.ledger.failure(&ticket, FailureReason::TaskAborted)
            }
        };

        let extracted = matches!(outcome, AttemptOutcome::Extracted(_));
        match self.ledger.record_outcome(&ticket, &outcome).await {
            Ok(()) if extracted => ItemResult::Succeeded,
            Ok(()) => ItemResult::Failed,
            Err(e) => {
                debug!("[条目 {}] 结果未写回: {}", item.id, e);
                ItemResult::Failed
            }
        }
    }
}
