//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! app (一次运行：补写 → 拉取 → 会话 → 汇总)
//!     ↓
//! batch_processor (并发处理 Vec<WorkItem>)
//!     ↓
//! item_processor (处理单个 WorkItem)
//!     ↓
//! services (能力层：retry_ledger / result_writer / outcome_journal)
//!     ↓
//! infrastructure / extract (标签页渲染、正文抽取)
//! ```

pub mod app;
pub mod batch_processor;
pub mod item_processor;

pub use app::App;
pub use batch_processor::BatchDispatcher;
pub use item_processor::{ItemProcessor, ItemResult};
