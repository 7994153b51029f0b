use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::work_item::ItemStatus;

/// 部分字段更新
///
/// 只有 `Some` 的字段会被写入，其余字段在存储中保持原样。
/// `last_error` 多包一层 `Option`，用 `Some(None)` 表示清空。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<ItemStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_field"
    )]
    pub last_error: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_retrying: Option<bool>,
}

fn present_field<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ItemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.extracted_content = Some(content.into());
        self
    }

    pub fn attempt_count(mut self, count: u32) -> Self {
        self.attempt_count = Some(count);
        self
    }

    pub fn status(mut self, status: ItemStatus) -> Self {
        self.last_status = Some(status);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }

    pub fn processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.processed_at = Some(at);
        self
    }

    pub fn stop_retrying(mut self, stop: bool) -> Self {
        self.stop_retrying = Some(stop);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    pub fn field_count(&self) -> usize {
        [
            self.extracted_content.is_some(),
            self.attempt_count.is_some(),
            self.last_status.is_some(),
            self.last_error.is_some(),
            self.processed_at.is_some(),
            self.stop_retrying.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

/// 失败原因，写入 `last_error` 时作为标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NavigationTimeout,
    NoContentExtracted,
    FetchFailed,
    ScriptFailed,
    TaskAborted,
}

impl FailureReason {
    pub fn tag(self) -> &'static str {
        match self {
            FailureReason::NavigationTimeout => "navigation_timeout",
            FailureReason::NoContentExtracted => "no_content",
            FailureReason::FetchFailed => "fetch_failed",
            FailureReason::ScriptFailed => "script_failed",
            FailureReason::TaskAborted => "task_aborted",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 抽取成功，携带正文
    Extracted(String),
    /// 失败，仍可重试；携带带尝试标签的错误描述
    Failed(String),
    /// 重试次数耗尽
    GivenUp(String),
}

impl AttemptOutcome {
    pub fn status(&self) -> ItemStatus {
        match self {
            AttemptOutcome::Extracted(_) => ItemStatus::Extracted,
            AttemptOutcome::Failed(_) => ItemStatus::Failed,
            AttemptOutcome::GivenUp(_) => ItemStatus::GivenUp,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Extracted(_))
    }
}

/// 一次批处理的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// 已有正文而被跳过的条目
    pub skipped: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}
