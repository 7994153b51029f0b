//! # Article Extract
//!
//! 批量抓取网页并抽取可读正文、写回远程存储的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Browser / Clients）
//! - `browser/` - 每次运行只启动一个无头浏览器，所有退出路径都会关闭
//! - `infrastructure/` - `JsExecutor` 是唯一的 page owner，`PageRenderer` 暴露"渲染一个 URL"的能力
//! - `clients/` - `WorkStore` 抽象远程条目存储，`HttpStore` 走 libSQL HTTP 管道协议
//!
//! ### ② 抽取引擎（Extract）
//! - `extract/` - 纯函数：DOM 快照 + 跳过规则 + 字符预算 → 正文
//!
//! ### ③ 业务能力层（Services）
//! - `RetryLedger` - 尝试前预写、结果分类、重试上限
//! - `ResultWriter` - 把单个条目的结果写回存储
//! - `OutcomeJournal` - 写回失败的结果先落到本地，下次运行前补写
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 一次完整运行
//! - `orchestrator/batch_processor` - 并发处理一批条目，故障隔离
//! - `orchestrator/item_processor` - 处理单个条目
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{HttpStore, MemoryStore, WorkStore};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use extract::{extract_text, DomNode, SkipRules};
pub use infrastructure::{JsExecutor, PageRenderer};
pub use models::{AttemptOutcome, BatchReport, ItemStatus, ItemUpdate, WorkItem};
pub use orchestrator::App;
