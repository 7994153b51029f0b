use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::update::ItemUpdate;

/// 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Attempting,
    Extracted,
    Failed,
    GivenUp,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Attempting => "attempting",
            ItemStatus::Extracted => "extracted",
            ItemStatus::Failed => "failed",
            ItemStatus::GivenUp => "given_up",
        }
    }

    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Pending,
        ItemStatus::Attempting,
        ItemStatus::Extracted,
        ItemStatus::Failed,
        ItemStatus::GivenUp,
    ];

    /// 可以转换到 `next` 的全部状态
    pub fn predecessors(next: ItemStatus) -> Vec<ItemStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// `Extracted` 与 `GivenUp` 为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Extracted | ItemStatus::GivenUp)
    }

    /// 状态机允许的转换
    ///
    /// `Attempting -> Attempting` 只出现在上一次运行在尝试中途被杀掉之后。
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        match (self, next) {
            (Pending, Attempting) | (Failed, Attempting) | (Attempting, Attempting) => true,
            (Attempting, Extracted) | (Attempting, Failed) | (Attempting, GivenUp) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "attempting" => Ok(ItemStatus::Attempting),
            "extracted" => Ok(ItemStatus::Extracted),
            "failed" => Ok(ItemStatus::Failed),
            "given_up" | "givenup" => Ok(ItemStatus::GivenUp),
            other => Err(format!("未知的条目状态: {}", other)),
        }
    }
}

/// 一个待抓取的新闻链接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    #[serde(default)]
    pub attempt_count: u32,
    pub last_status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// 放弃后置位，生产端不再把它放回待处理池
    #[serde(default)]
    pub stop_retrying: bool,
}

impl WorkItem {
    /// 新建一个 `Pending` 条目
    pub fn pending(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            extracted_content: None,
            attempt_count: 0,
            last_status: ItemStatus::Pending,
            last_error: None,
            processed_at: None,
            stop_retrying: false,
        }
    }

    /// 已经有正文的条目不会再被尝试
    pub fn has_content(&self) -> bool {
        self.extracted_content
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// 合并部分更新，未提供的字段保持不变
    pub fn apply(&mut self, update: &ItemUpdate) {
        if let Some(content) = &update.extracted_content {
            self.extracted_content = Some(content.clone());
        }
        if let Some(count) = update.attempt_count {
            self.attempt_count = count;
        }
        if let Some(status) = update.last_status {
            self.last_status = status;
        }
        if let Some(error) = &update.last_error {
            self.last_error = error.clone();
        }
        if let Some(at) = update.processed_at {
            self.processed_at = Some(at);
        }
        if let Some(stop) = update.stop_retrying {
            self.stop_retrying = stop;
        }
    }
}
