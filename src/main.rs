use std::path::PathBuf;

use anyhow::{Context, Result};
use article_extract::utils::logging;
use article_extract::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 配置文件路径：命令行第一个参数，其次 EXTRACT_CONFIG
    let config_path: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("EXTRACT_CONFIG").ok())
        .map(PathBuf::from);

    // 加载配置
    let config = Config::load(config_path.as_deref()).context("加载配置失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let report = App::initialize(config)?.run().await?;

    if report.total() == 0 {
        tracing::info!("本次运行没有处理任何条目");
    }

    Ok(())
}
