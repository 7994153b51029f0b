//! 浏览器会话管理
//!
//! 每次批处理只启动一个浏览器进程，并保证在所有退出路径上关闭它。

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info};

use crate::error::BrowserLaunchError;
use crate::infrastructure::PageRenderer;

/// 浏览器启动器
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: PageRenderer + 'static;

    async fn launch(&self) -> Result<Self::Session, BrowserLaunchError>;

    /// 关闭浏览器；失败只记录日志
    async fn shutdown(&self, session: &Self::Session);
}

/// 在一个浏览器会话内执行 `batch_fn`
///
/// 启动失败时 `batch_fn` 不会执行。`batch_fn` 无论正常返回还是 panic，
/// 浏览器都会先被关闭，panic 在关闭之后继续传播。
pub async fn with_session<L, F, Fut, T>(launcher: &L, batch_fn: F) -> Result<T, BrowserLaunchError>
where
    L: BrowserLauncher,
    F: FnOnce(Arc<L::Session>) -> Fut,
    Fut: Future<Output = T>,
{
    let session = Arc::new(launcher.launch().await.map_err(|e| {
        error!("浏览器启动失败，本次运行不处理任何条目: {}", e);
        e
    })?);
    info!("✓ 浏览器会话已建立");

    let outcome = AssertUnwindSafe(batch_fn(Arc::clone(&session)))
        .catch_unwind()
        .await;

    launcher.shutdown(&session).await;
    info!("✓ 浏览器会话已关闭");

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::extract::DomNode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullSession;

    #[async_trait]
    impl PageRenderer for NullSession {
        async fn render(&self, _url: &str) -> Result<DomNode, FetchError> {
            Ok(DomNode::element("body", Vec::new()))
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        fail_launch: bool,
        launches: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    #[async_trait]
    impl BrowserLauncher for CountingLauncher {
        type Session = NullSession;

        async fn launch(&self) -> Result<NullSession, BrowserLaunchError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if self.fail_launch {
                return Err(BrowserLaunchError::Other("no chrome".into()));
            }
            Ok(NullSession)
        }

        async fn shutdown(&self, _session: &NullSession) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn tears_down_after_success() {
        let launcher = CountingLauncher::default();
        let value = with_session(&launcher, |_s| async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(launcher.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tears_down_when_batch_returns_error() {
        let launcher = CountingLauncher::default();
        let result: Result<Result<(), String>, _> =
            with_session(&launcher, |_s| async { Err("boom".to_string()) }).await;
        assert_eq!(result.unwrap(), Err("boom".to_string()));
        assert_eq!(launcher.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tears_down_when_batch_panics() {
        let launcher = Arc::new(CountingLauncher::default());
        let inner = Arc::clone(&launcher);
        let joined = tokio::spawn(async move {
            with_session(inner.as_ref(), |_s| async {
                panic!("batch exploded");
            })
            .await
        })
        .await;

        assert!(joined.is_err());
        assert_eq!(launcher.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn launch_failure_skips_batch() {
        let launcher = CountingLauncher {
            fail_launch: true,
            ..Default::default()
        };
        let ran = AtomicUsize::new(0);
        let result = with_session(&launcher, |_s| async {
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(launcher.shutdowns.load(Ordering::SeqCst), 0);
    }
}
