//! 一次完整的批处理运行
//!
//! 补写上次遗留的结果 → 拉取待处理条目 → 启动浏览器 → 并发抽取 → 关闭浏览器 → 汇总。
//! 只有浏览器启动失败、首次拉取失败和结果日志读写失败会作为错误返回。

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::batch_processor::BatchDispatcher;
use super::item_processor::ItemProcessor;
use crate::browser::{with_session, BrowserLauncher, ChromiumLauncher, PageSettings};
use crate::clients::{HttpStore, WorkStore};
use crate::config::Config;
use crate::error::AppResult;
use crate::extract::SkipRules;
use crate::models::BatchReport;
use crate::services::{OutcomeJournal, ResultWriter, RetryLedger};
use crate::utils::logging;

/// 应用主结构
pub struct App<L: BrowserLauncher = ChromiumLauncher> {
    config: Config,
    store: Arc<dyn WorkStore>,
    launcher: L,
    journal: Option<Arc<OutcomeJournal>>,
    rules: SkipRules,
}

impl App<ChromiumLauncher> {
    /// 用远程存储和本地 Chrome 初始化
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        let store = Arc::new(HttpStore::new(&config)?);
        let launcher = ChromiumLauncher::new(&config);
        Ok(Self::with_parts(config, store, launcher))
    }
}

impl<L: BrowserLauncher> App<L> {
    pub fn with_parts(config: Config, store: Arc<dyn WorkStore>, launcher: L) -> Self {
        let journal = config
            .outcome_journal
            .as_ref()
            .map(|path| Arc::new(OutcomeJournal::new(path)));
        Self {
            config,
            store,
            launcher,
            journal,
            rules: SkipRules::default(),
        }
    }

    /// 替换默认的跳过规则
    pub fn with_rules(mut self, rules: SkipRules) -> Self {
        self.rules = rules;
        self
    }

    /// 运行一次批处理
    pub async fn run(&self) -> AppResult<BatchReport> {
        logging::log_startup(&self.config);

        let retained = match &self.journal {
            Some(journal) => journal.replay(self.store.as_ref()).await?.retained_ids,
            None => Default::default(),
        };

        let mut items = self
            .store
            .fetch_pending(self.config.batch_size, self.config.max_attempts)
            .await?;

        if !retained.is_empty() {
            items.retain(|item| {
                let keep = !retained.contains(&item.id);
                if !keep {
                    warn!("[条目 {}] 上次结果尚未写回，本次跳过", item.id);
                }
                keep
            });
        }

        if items.is_empty() {
            info!("没有待处理的条目，本次运行结束");
            return Ok(BatchReport::default());
        }
        logging::log_items_loaded(items.len(), self.config.batch_size);

        let dispatcher = self.dispatcher();
        let total = items.len();
        let report = with_session(&self.launcher, |session| async move {
            dispatcher.run_batch(items, session).await
        })
        .await?;

        logging::print_final_stats(&report, total);
        Ok(report)
    }

    fn dispatcher(&self) -> BatchDispatcher {
        let mut writer = ResultWriter::new(Arc::clone(&self.store));
        if let Some(journal) = &self.journal {
            writer = writer.with_journal(Arc::clone(journal));
        }
        let ledger = RetryLedger::new(Arc::clone(&self.store), writer, self.config.max_attempts);

        // 外层兜底：开标签页 + 渲染总时限 + 关标签页，再留余量，正常情况下由渲染器内部先超时
        let deadline = self.config.page_timeout()
            + PageSettings::from_config(&self.config).render_budget()
            + self.config.page_timeout()
            + Duration::from_secs(5);

        let processor = ItemProcessor::new(
            ledger,
            self.rules.clone(),
            self.config.max_chars,
            deadline,
        );
        BatchDispatcher::new(processor, self.config.batch_size)
    }
}
