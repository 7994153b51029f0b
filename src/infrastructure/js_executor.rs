//! JS 执行器 - 基础设施层
//!
//! 持有单个标签页，只暴露"执行 JS"和"关闭"的能力

use std::sync::atomic::{AtomicBool, Ordering};

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::FetchError;
use crate::extract::{DomNode, DomSnapshot, SNAPSHOT_SCRIPT};

/// JS 执行器
///
/// 职责：
/// - 持有一个 Page
/// - 暴露 eval() 能力
/// - 不认识 WorkItem
/// - 未显式关闭就被丢弃时，在后台关闭标签页
pub struct JsExecutor {
    page: Page,
    closed: AtomicBool,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            closed: AtomicBool::new(false),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, FetchError> {
        let script: String = js_code.into();
        let result = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| FetchError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| FetchError::Script(e.to_string()))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, FetchError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| FetchError::Script(e.to_string()))
    }

    /// 抓取 body 的 DOM 快照；没有 body 时得到空的 body 元素
    pub async fn snapshot_dom(&self) -> Result<DomNode, FetchError> {
        let snapshot: DomSnapshot = self.eval_as(SNAPSHOT_SCRIPT).await?;
        Ok(snapshot
            .into_tree()
            .unwrap_or_else(|| DomNode::element("body", Vec::new())))
    }

    /// 关闭标签页，重复调用只关闭一次
    pub async fn close(&self) -> Result<(), FetchError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| FetchError::Script(format!("关闭页面失败: {}", e)))
    }
}

impl Drop for JsExecutor {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let page = self.page.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("后台关闭页面失败: {}", e);
                }
            });
        }
    }
}
