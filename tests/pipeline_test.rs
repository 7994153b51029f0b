//! 整条流水线测试：进程内存储 + 脚本化渲染器，不需要真实浏览器

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use article_extract::browser::BrowserLauncher;
use article_extract::clients::{MemoryStore, UpdateFailure, WorkStore};
use article_extract::error::{AppError, BrowserLaunchError, FetchError};
use article_extract::orchestrator::{ItemProcessor, ItemResult};
use article_extract::services::{ResultWriter, RetryLedger};
use article_extract::{
    App, BatchReport, Config, DomNode, ItemStatus, PageRenderer, SkipRules, WorkItem,
};
use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

fn url(id: &str) -> String {
    format!("https://news.example/{}", id)
}

fn article(text: &str) -> DomNode {
    DomNode::element(
        "body",
        vec![
            DomNode::element("nav", vec![DomNode::text("Home News Sport")]),
            DomNode::element(
                "article",
                vec![DomNode::element("p", vec![DomNode::text(text)])],
            ),
        ],
    )
}

enum Script {
    Page(DomNode),
    NavigationError,
    Panic,
    Hang,
}

/// 按 URL 返回预设结果，并记录渲染时存储中看到的尝试次数
struct ScriptedRenderer {
    scripts: HashMap<String, Script>,
    store: Arc<MemoryStore>,
    observed: Mutex<Vec<(String, u32, ItemStatus)>>,
}

impl ScriptedRenderer {
    fn new(store: Arc<MemoryStore>, scripts: Vec<(&str, Script)>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(id, script)| (url(id), script))
                .collect(),
            store,
            observed: Mutex::new(Vec::new()),
        }
    }

    fn observed(&self) -> Vec<(String, u32, ItemStatus)> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, target: &str) -> Result<DomNode, FetchError> {
        let id = target.rsplit('/').next().unwrap_or_default().to_string();
        if let Some(item) = self.store.get(&id).await {
            self.observed
                .lock()
                .unwrap()
                .push((id, item.attempt_count, item.last_status));
        }

        match self.scripts.get(target) {
            Some(Script::Page(dom)) => Ok(dom.clone()),
            Some(Script::NavigationError) | None => Err(FetchError::Navigation {
                url: target.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
            Some(Script::Panic) => panic!("renderer crashed on {}", target),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

struct SharedSession(Arc<ScriptedRenderer>);

#[async_trait]
impl PageRenderer for SharedSession {
    async fn render(&self, target: &str) -> Result<DomNode, FetchError> {
        self.0.render(target).await
    }
}

struct FakeLauncher {
    renderer: Arc<ScriptedRenderer>,
    fail_launch: bool,
    launches: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl FakeLauncher {
    fn new(renderer: Arc<ScriptedRenderer>) -> Self {
        Self {
            renderer,
            fail_launch: false,
            launches: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(renderer: Arc<ScriptedRenderer>) -> Self {
        Self {
            fail_launch: true,
            ..Self::new(renderer)
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Session = SharedSession;

    async fn launch(&self) -> Result<SharedSession, BrowserLaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(BrowserLaunchError::Other("chrome not found".into()));
        }
        Ok(SharedSession(Arc::clone(&self.renderer)))
    }

    async fn shutdown(&self, _session: &SharedSession) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_config(journal: Option<String>) -> Config {
    Config {
        batch_size: 5,
        max_attempts: 3,
        max_chars: 5000,
        settle_delay_ms: 0,
        page_timeout_ms: 1_000,
        outcome_journal: journal,
        ..Config::default()
    }
}

fn processor(store: &Arc<MemoryStore>, deadline: Duration) -> ItemProcessor {
    let ledger = RetryLedger::new(store.clone(), ResultWriter::new(store.clone()), 3);
    ItemProcessor::new(ledger, SkipRules::default(), 5000, deadline)
}

#[tokio::test]
async fn one_navigation_error_does_not_affect_the_rest() {
    let store = Arc::new(MemoryStore::with_items([
        WorkItem::pending("a", url("a")),
        WorkItem::pending("b", url("b")),
        WorkItem::pending("c", url("c")),
    ]));
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![
            ("a", Script::Page(article("First story body."))),
            ("b", Script::NavigationError),
            ("c", Script::Page(article("Third story body."))),
        ],
    ));
    let launcher = FakeLauncher::new(renderer.clone());
    let (launches, shutdowns) = (launcher.launches.clone(), launcher.shutdowns.clone());

    let app = App::with_parts(test_config(None), store.clone(), launcher);
    let report = assert_ok!(app.run().await);

    assert_eq!(
        report,
        BatchReport {
            succeeded: 2,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    let a = store.get("a").await.unwrap();
    assert_eq!(a.last_status, ItemStatus::Extracted);
    assert_eq!(a.extracted_content.as_deref(), Some("First story body."));
    assert_eq!(a.last_error, None);
    assert!(a.processed_at.is_some());

    let b = store.get("b").await.unwrap();
    assert_eq!(b.last_status, ItemStatus::Failed);
    assert_eq!(b.attempt_count, 1);
    assert_eq!(b.last_error.as_deref(), Some("fetch_failed (1/3)"));
    assert_eq!(b.extracted_content, None);
}

#[tokio::test]
async fn attempt_count_is_persisted_before_rendering() {
    let store = Arc::new(MemoryStore::with_items([
        WorkItem::pending("a", url("a")),
        WorkItem {
            attempt_count: 1,
            last_status: ItemStatus::Failed,
            ..WorkItem::pending("b", url("b"))
        },
    ]));
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![
            ("a", Script::Page(article("Body."))),
            ("b", Script::Page(article("Body."))),
        ],
    ));
    let app = App::with_parts(
        test_config(None),
        store.clone(),
        FakeLauncher::new(renderer.clone()),
    );
    assert_ok!(app.run().await);

    let mut observed = renderer.observed();
    observed.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        observed,
        vec![
            ("a".to_string(), 1, ItemStatus::Attempting),
            ("b".to_string(), 2, ItemStatus::Attempting),
        ]
    );
}

#[tokio::test]
async fn repeated_failures_give_up_at_the_ceiling() {
    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("x", url("x"))]));
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![("x", Script::NavigationError)],
    ));
    let launcher = FakeLauncher::new(renderer);
    let launches = launcher.launches.clone();
    let app = App::with_parts(test_config(None), store.clone(), launcher);

    for run in 1..=3u32 {
        let report = assert_ok!(app.run().await);
        assert_eq!(report.failed, 1);

        let x = store.get("x").await.unwrap();
        assert_eq!(x.attempt_count, run);
        assert_eq!(
            x.last_error.as_deref(),
            Some(format!("fetch_failed ({}/3)", run).as_str())
        );
    }

    let x = store.get("x").await.unwrap();
    assert_eq!(x.last_status, ItemStatus::GivenUp);
    assert!(x.stop_retrying);

    // 放弃后不再被拉取，也不再启动浏览器
    let report = assert_ok!(app.run().await);
    assert_eq!(report, BatchReport::default());
    assert_eq!(launches.load(Ordering::SeqCst), 3);
    assert!(assert_ok!(store.fetch_pending(10, 3).await).is_empty());
}

#[tokio::test]
async fn page_without_readable_text_is_no_content() {
    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("n", url("n"))]));
    let only_chrome = DomNode::element(
        "body",
        vec![
            DomNode::element("nav", vec![DomNode::text("Menu")]),
            DomNode::element("footer", vec![DomNode::text("Copyright")]),
        ],
    );
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![("n", Script::Page(only_chrome))],
    ));
    let app = App::with_parts(test_config(None), store.clone(), FakeLauncher::new(renderer));

    let report = assert_ok!(app.run().await);
    assert_eq!(report.failed, 1);

    let n = store.get("n").await.unwrap();
    assert_eq!(n.last_status, ItemStatus::Failed);
    assert_eq!(n.last_error.as_deref(), Some("no_content (1/3)"));
    assert_eq!(n.extracted_content, None);
}

#[tokio::test]
async fn custom_skip_rules_apply_to_the_run() {
    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("p", url("p"))]));
    let page = DomNode::element(
        "body",
        vec![
            DomNode::element_with("div", "paywall", "", vec![DomNode::text("Subscribe now")]),
            DomNode::element("p", vec![DomNode::text("Free paragraph.")]),
        ],
    );
    let renderer = Arc::new(ScriptedRenderer::new(store.clone(), vec![("p", Script::Page(page))]));
    let rules = SkipRules::new(["script"], ["paywall"]).unwrap();
    let app = App::with_parts(test_config(None), store.clone(), FakeLauncher::new(renderer))
        .with_rules(rules);

    assert_ok!(app.run().await);
    assert_eq!(
        store.get("p").await.unwrap().extracted_content.as_deref(),
        Some("Free paragraph.")
    );
}

#[tokio::test]
async fn renderer_panic_is_recorded_as_aborted() {
    let store = Arc::new(MemoryStore::with_items([
        WorkItem::pending("boom", url("boom")),
        WorkItem::pending("ok", url("ok")),
    ]));
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![
            ("boom", Script::Panic),
            ("ok", Script::Page(article("Survives its neighbour."))),
        ],
    ));
    let launcher = FakeLauncher::new(renderer);
    let shutdowns = launcher.shutdowns.clone();
    let app = App::with_parts(test_config(None), store.clone(), launcher);

    let report = assert_ok!(app.run().await);
    assert_eq!(
        report,
        BatchReport {
            succeeded: 1,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

    let boom = store.get("boom").await.unwrap();
    assert_eq!(boom.attempt_count, 1);
    assert_eq!(boom.last_status, ItemStatus::Failed);
    assert_eq!(boom.last_error.as_deref(), Some("task_aborted (1/3)"));
}

#[tokio::test]
async fn hanging_page_hits_the_item_deadline() {
    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("slow", url("slow"))]));
    let renderer = ScriptedRenderer::new(store.clone(), vec![("slow", Script::Hang)]);
    let item = store.get("slow").await.unwrap();

    let result = processor(&store, Duration::from_millis(50))
        .process(item, &renderer)
        .await;
    assert_eq!(result, ItemResult::Failed);

    let slow = store.get("slow").await.unwrap();
    assert_eq!(slow.attempt_count, 1);
    assert_eq!(slow.last_status, ItemStatus::Failed);
    assert_eq!(slow.last_error.as_deref(), Some("navigation_timeout (1/3)"));
}

#[tokio::test]
async fn item_with_content_is_skipped_without_any_write() {
    let store = Arc::new(MemoryStore::with_items([WorkItem {
        extracted_content: Some("Already here.".to_string()),
        ..WorkItem::pending("done", url("done"))
    }]));
    let renderer = ScriptedRenderer::new(store.clone(), Vec::new());
    let item = store.get("done").await.unwrap();

    let result = processor(&store, Duration::from_secs(1))
        .process(item, &renderer)
        .await;
    assert_eq!(result, ItemResult::Skipped);
    assert!(store.history("done").await.is_empty());
    assert!(renderer.observed().is_empty());
}

#[tokio::test]
async fn failed_pre_write_means_no_attempt() {
    let store = Arc::new(MemoryStore::with_items([
        WorkItem::pending("locked", url("locked")),
        WorkItem::pending("free", url("free")),
    ]));
    store.fail_updates("locked", UpdateFailure::Always).await;
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![
            ("locked", Script::Page(article("Never rendered."))),
            ("free", Script::Page(article("Rendered."))),
        ],
    ));
    let app = App::with_parts(
        test_config(None),
        store.clone(),
        FakeLauncher::new(renderer.clone()),
    );

    let report = assert_ok!(app.run().await);
    assert_eq!(
        report,
        BatchReport {
            succeeded: 1,
            failed: 1,
            skipped: 0
        }
    );

    let locked = store.get("locked").await.unwrap();
    assert_eq!(locked.attempt_count, 0);
    assert_eq!(locked.last_status, ItemStatus::Pending);
    assert!(renderer.observed().iter().all(|(id, _, _)| id != "locked"));
}

#[tokio::test]
async fn failed_post_write_is_journaled_and_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let journal = dir.path().join("unflushed.jsonl");
    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("j", url("j"))]));
    store.fail_updates("j", UpdateFailure::OnOutcome).await;
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![("j", Script::Page(article("Recovered later.")))],
    ));
    let launcher = FakeLauncher::new(renderer);
    let launches = launcher.launches.clone();
    let app = App::with_parts(
        test_config(Some(journal.display().to_string())),
        store.clone(),
        launcher,
    );

    // 第一次：抽取成功但结果写不回去
    let report = assert_ok!(app.run().await);
    assert_eq!(report.failed, 1);
    let j = store.get("j").await.unwrap();
    assert_eq!(j.last_status, ItemStatus::Attempting);
    assert_eq!(j.attempt_count, 1);
    assert!(journal.exists());

    // 第二次：存储仍然拒绝，条目被保留且本次不再尝试
    let report = assert_ok!(app.run().await);
    assert_eq!(report, BatchReport::default());
    assert_eq!(store.get("j").await.unwrap().attempt_count, 1);
    assert_eq!(launches.load(Ordering::SeqCst), 1);

    // 第三次：存储恢复，先补写，再无条目可处理
    store.clear_failures().await;
    let report = assert_ok!(app.run().await);
    assert_eq!(report, BatchReport::default());

    let j = store.get("j").await.unwrap();
    assert_eq!(j.last_status, ItemStatus::Extracted);
    assert_eq!(j.extracted_content.as_deref(), Some("Recovered later."));
    assert!(!journal.exists());
}

#[tokio::test]
async fn launch_failure_aborts_the_run_without_writes() {
    let store = Arc::new(MemoryStore::with_items([
        WorkItem::pending("a", url("a")),
        WorkItem::pending("b", url("b")),
    ]));
    let renderer = Arc::new(ScriptedRenderer::new(store.clone(), Vec::new()));
    let launcher = FakeLauncher::failing(renderer);
    let shutdowns = launcher.shutdowns.clone();
    let app = App::with_parts(test_config(None), store.clone(), launcher);

    let err = assert_err!(app.run().await);
    assert!(matches!(err, AppError::BrowserLaunch(_)));
    assert_eq!(shutdowns.load(Ordering::SeqCst), 0);
    assert!(store.history("a").await.is_empty());
    assert!(store.history("b").await.is_empty());
}

#[tokio::test]
async fn empty_queue_does_not_launch_a_browser() {
    let store = Arc::new(MemoryStore::new());
    let renderer = Arc::new(ScriptedRenderer::new(store.clone(), Vec::new()));
    let launcher = FakeLauncher::new(renderer);
    let launches = launcher.launches.clone();
    let app = App::with_parts(test_config(None), store, launcher);

    let report = assert_ok!(app.run().await);
    assert_eq!(report.total(), 0);
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreachable_store_fails_before_launch() {
    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("a", url("a"))]));
    store.set_fetch_unavailable(true).await;
    let renderer = Arc::new(ScriptedRenderer::new(store.clone(), Vec::new()));
    let launcher = FakeLauncher::new(renderer);
    let launches = launcher.launches.clone();
    let app = App::with_parts(test_config(None), store, launcher);

    let err = assert_err!(app.run().await);
    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_ids_in_a_batch_are_attempted_once() {
    use article_extract::orchestrator::BatchDispatcher;

    let store = Arc::new(MemoryStore::with_items([WorkItem::pending("d", url("d"))]));
    let renderer = Arc::new(ScriptedRenderer::new(
        store.clone(),
        vec![("d", Script::Page(article("Once.")))],
    ));
    let item = store.get("d").await.unwrap();

    let dispatcher = BatchDispatcher::new(processor(&store, Duration::from_secs(1)), 2);
    let report = dispatcher
        .run_batch(vec![item.clone(), item], renderer.clone())
        .await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.total(), 1);
    assert_eq!(store.get("d").await.unwrap().attempt_count, 1);
    assert_eq!(renderer.observed().len(), 1);
}
