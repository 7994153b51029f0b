use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::session::BrowserLauncher;
use crate::config::Config;
use crate::error::{BrowserLaunchError, FetchError};
use crate::extract::DomNode;
use crate::infrastructure::{JsExecutor, PageRenderer};

/// 每个标签页共用的抓取参数
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub page_timeout: Duration,
    pub settle_delay: Duration,
    pub user_agent: String,
}

impl PageSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_timeout: config.page_timeout(),
            settle_delay: config.settle_delay(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// 单个标签页从设置 User-Agent 到拿到快照的总时限
    pub fn render_budget(&self) -> Duration {
        self.page_timeout * 3 + self.settle_delay
    }

    fn user_agent_override(&self) -> SetUserAgentOverrideParams {
        SetUserAgentOverrideParams::new(self.user_agent.clone())
    }
}

/// 启动本地无头 Chrome
pub struct ChromiumLauncher {
    chrome_executable: Option<String>,
    headless: bool,
    settings: PageSettings,
}

impl ChromiumLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_executable: config.chrome_executable.clone(),
            headless: config.headless,
            settings: PageSettings::from_config(config),
        }
    }
}

/// 一个浏览器进程
///
/// 各任务只通过读锁创建新标签页，关闭浏览器时取写锁。
pub struct ChromiumSession {
    browser: RwLock<Browser>,
    handler: JoinHandle<()>,
    settings: PageSettings,
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession, BrowserLaunchError> {
        info!("🚀 启动无头浏览器...");

        let mut builder = BrowserConfig::builder()
            .args(vec![
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--remote-debugging-port=0",
            ])
            .request_timeout(self.settings.page_timeout);
        builder = if self.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(Path::new(path));
        }
        let config = builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            BrowserLaunchError::Config(e)
        })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            BrowserLaunchError::Launch(e)
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        // 等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        Ok(ChromiumSession {
            browser: RwLock::new(browser),
            handler,
            settings: self.settings.clone(),
        })
    }

    async fn shutdown(&self, session: &ChromiumSession) {
        let mut browser = session.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("正常关闭浏览器失败，强制结束进程: {}", e);
            if let Some(Err(e)) = browser.kill().await {
                error!("结束浏览器进程失败: {}", e);
            }
        }
        if let Err(e) = browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        session.handler.abort();
    }
}

impl ChromiumSession {
    async fn load_and_snapshot(&self, executor: &JsExecutor, url: &str) -> Result<DomNode, FetchError> {
        let page = executor.page();
        let timeout_ms = self.settings.page_timeout.as_millis() as u64;

        timeout(
            self.settings.page_timeout,
            page.set_user_agent(self.settings.user_agent_override()),
        )
        .await
        .map_err(|_| FetchError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms,
        })?
        .map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            message: format!("设置 User-Agent 失败: {}", e),
        })?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match timeout(self.settings.page_timeout, navigation).await {
            Err(_) | Ok(Err(chromiumoxide::error::CdpError::Timeout)) => {
                return Err(FetchError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms,
                })
            }
            Ok(Err(e)) => {
                return Err(FetchError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(())) => debug!("已导航到: {}", url),
        }

        sleep(self.settings.settle_delay).await;

        timeout(self.settings.page_timeout, executor.snapshot_dom())
            .await
            .map_err(|_| FetchError::Script(format!("DOM 快照超时 ({}ms)", timeout_ms)))?
    }
}

/// 在 `limit` 内执行 `work`；无论成功、失败还是超时，之后都执行 `release`
///
/// `release` 的错误只记录日志，不覆盖 `work` 的结果。
async fn run_then_release<T, W, R>(
    limit: Duration,
    url: &str,
    work: W,
    release: R,
) -> Result<T, FetchError>
where
    W: Future<Output = Result<T, FetchError>>,
    R: Future<Output = Result<(), FetchError>>,
{
    let result = match timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    };

    if let Err(e) = release.await {
        warn!("{}", e);
    }
    result
}

#[async_trait]
impl PageRenderer for ChromiumSession {
    async fn render(&self, url: &str) -> Result<DomNode, FetchError> {
        let page = {
            let browser = self.browser.read().await;
            match timeout(self.settings.page_timeout, browser.new_page("about:blank")).await {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    error!("创建新页面失败: {}", e);
                    return Err(FetchError::PageCreation(e.to_string()));
                }
                Err(_) => {
                    error!("创建新页面超时");
                    return Err(FetchError::PageCreation("创建页面超时".to_string()));
                }
            }
        };
        let executor = JsExecutor::new(page);

        // 标签页在这里关闭；即使外层任务被取消，JsExecutor 析构时也会在后台关闭
        run_then_release(
            self.settings.render_budget(),
            url,
            self.load_and_snapshot(&executor, url),
            async {
                timeout(self.settings.page_timeout, executor.close())
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Script("关闭页面超时".to_string())))
            },
        )
        .await
    }
}
