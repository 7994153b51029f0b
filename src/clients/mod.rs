//! 存储客户端
//!
//! 其他组件只通过 [`WorkStore`] 访问远程条目存储。

pub mod memory_store;
pub mod store_client;
mod wire;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ItemUpdate, WorkItem};

pub use memory_store::{MemoryStore, UpdateFailure};
pub use store_client::HttpStore;

#[async_trait]
pub trait WorkStore: Send + Sync {
    /// 拉取待处理条目：`pending`，或未达重试上限的 `failed` / 中断的 `attempting`，按新近排序
    async fn fetch_pending(&self, limit: usize, max_attempts: u32)
        -> Result<Vec<WorkItem>, StoreError>;

    /// 按 id 做部分字段更新，单条语句，要么全部生效要么都不生效
    async fn apply_update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError>;
}
