//! 未写回结果日志 - 业务能力层
//!
//! 尝试结束后写存储失败时，把那次更新追加到本地 JSON Lines 文件；
//! 下一次运行在拉取新条目之前先把它们补写回存储。

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clients::WorkStore;
use crate::error::{JournalError, StoreError};
use crate::models::ItemUpdate;

/// 一条未写回的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub update: ItemUpdate,
    pub recorded_at: DateTime<Utc>,
}

/// 补写汇总
#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub flushed: usize,
    pub dropped: usize,
    /// 仍未写回的条目，本次运行不应再尝试它们
    pub retained_ids: HashSet<String>,
}

pub struct OutcomeJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutcomeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录
    pub async fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        let _guard = self.lock.lock().await;
        debug!("写入结果日志: 条目 {}", entry.id);

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// 读取全部记录；文件不存在视为空，无法解析的行跳过
    pub async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "结果日志第 {} 行无法解析，已跳过: {}",
                    line_no + 1,
                    e
                ),
            }
        }
        Ok(entries)
    }

    /// 把记录逐条补写回存储，写回成功的从文件中移除
    pub async fn replay(&self, store: &dyn WorkStore) -> Result<ReplaySummary, JournalError> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        let mut summary = ReplaySummary::default();
        if entries.is_empty() {
            return Ok(summary);
        }

        info!("📒 发现 {} 条未写回的结果，开始补写", entries.len());
        let mut remaining = Vec::new();
        for entry in entries {
            match store.apply_update(&entry.id, &entry.update).await {
                Ok(()) => summary.flushed += 1,
                Err(e @ (StoreError::NotFound { .. } | StoreError::InvalidTransition { .. })) => {
                    warn!("[条目 {}] 结果已无法写回，丢弃: {}", entry.id, e);
                    summary.dropped += 1;
                }
                Err(e) => {
                    warn!("[条目 {}] 补写失败，保留到下次: {}", entry.id, e);
                    summary.retained_ids.insert(entry.id.clone());
                    remaining.push(entry);
                }
            }
        }

        self.rewrite(&remaining).await?;
        info!(
            "📒 补写完成: 写回 {}, 丢弃 {}, 保留 {}",
            summary.flushed,
            summary.dropped,
            remaining.len()
        );
        Ok(summary)
    }

    /// 先写临时文件再改名，没有剩余记录时删除文件
    async fn rewrite(&self, entries: &[JournalEntry]) -> Result<(), JournalError> {
        if entries.is_empty() {
            match fs::remove_file(&self.path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        let mut body = String::new();
        for entry in entries {
            body.push_str(&serde_json::to_string(entry)?);
            body.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
