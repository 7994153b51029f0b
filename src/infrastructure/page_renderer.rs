use async_trait::async_trait;

use crate::error::FetchError;
use crate::extract::DomNode;

/// 渲染一个 URL 并返回 body 的 DOM 树
///
/// 每次调用使用独立的标签页，调用结束前标签页必定关闭。
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<DomNode, FetchError>;
}
