//! 批量条目调度器 - 编排层
//!
//! ## 职责
//!
//! 在同一个浏览器会话内并发处理一批条目，并做到故障隔离：
//! 某个条目出错、超时甚至 panic，都不影响其他条目完成和落账。
//!
//! ## 设计特点
//!
//! - **并发控制**：Semaphore 限制同时打开的标签页数
//! - **全部等待**：逐个 await 每个任务句柄，不因单个失败提前返回
//! - **去重**：同一批内重复的 id 只尝试一次

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use super::item_processor::{ItemProcessor, ItemResult};
use crate::infrastructure::PageRenderer;
use crate::models::{BatchReport, WorkItem};

pub struct BatchDispatcher {
    processor: Arc<ItemProcessor>,
    batch_size: usize,
}

impl BatchDispatcher {
    pub fn new(processor: ItemProcessor, batch_size: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            batch_size: batch_size.max(1),
        }
    }

    /// 处理一批条目，返回汇总
    pub async fn run_batch<R>(&self, items: Vec<WorkItem>, renderer: Arc<R>) -> BatchReport
    where
        R: PageRenderer + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.batch_size));
        let mut seen = HashSet::new();
        let mut handles = Vec::new();

        for item in items {
            if !seen.insert(item.id.clone()) {
                warn!("[条目 {}] 同一批内重复出现，忽略", item.id);
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let processor = Arc::clone(&self.processor);
            let renderer = Arc::clone(&renderer);
            let item_id = item.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ItemResult::Failed,
                };
                processor.process(item, &*renderer).await
            });
            handles.push((item_id, handle));
        }

        // 等待本批所有任务完成
        let mut report = BatchReport::default();
        for (item_id, handle) in handles {
            match handle.await {
                Ok(ItemResult::Succeeded) => report.succeeded += 1,
                Ok(ItemResult::Failed) => report.failed += 1,
                Ok(ItemResult::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!("[条目 {}] 任务执行失败: {}", item_id, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
