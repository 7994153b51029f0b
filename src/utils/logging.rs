/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::BatchReport;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，未设置时按 `verbose` 选择 debug 或 info。
/// 重复调用不会报错（测试中可能多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("article_extract={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 网页正文批量抽取");
    info!("📊 并发数: {}", config.batch_size);
    info!("🔁 重试上限: {}", config.max_attempts);
    info!("✂️ 正文预算: {} 字符", config.max_chars);
    info!("{}", "=".repeat(60));
}

/// 记录条目加载信息
///
/// # 参数
/// - `total`: 本次拉取到的条目数
/// - `batch_size`: 并发数
pub fn log_items_loaded(total: usize, batch_size: usize) {
    info!("✓ 找到 {} 个待处理的条目", total);
    info!("📋 最多同时打开 {} 个标签页", batch_size);
}

/// 打印最终统计信息
pub fn print_final_stats(report: &BatchReport, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 本次运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.succeeded, total);
    info!("❌ 失败: {}", report.failed);
    info!("⏭️ 跳过: {}", report.skipped);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
