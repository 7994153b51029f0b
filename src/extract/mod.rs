//! 正文抽取引擎
//!
//! 纯函数：同样的 DOM 与字符预算总是得到同样的结果，不依赖网络时序。

pub mod dom;
pub mod rules;
pub mod walker;

pub use dom::{DomNode, DomSnapshot, SNAPSHOT_SCRIPT};
pub use rules::SkipRules;
pub use walker::extract_text;
