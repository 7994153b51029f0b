use thiserror::Error;

/// 应用程序错误类型
///
/// 只有无法在单个条目内消化的错误才会以这种形式向上传播，
/// 单个条目的失败由 `AttemptOutcome` 表达。
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储相关错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 浏览器启动错误
    #[error("浏览器错误: {0}")]
    BrowserLaunch(#[from] BrowserLaunchError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 本地结果日志错误
    #[error("结果日志错误: {0}")]
    Journal(#[from] JournalError),
}

/// 远程存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 网络请求失败
    #[error("存储请求失败 ({operation}): {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// 存储返回非成功状态码
    #[error("存储返回非成功状态 ({operation}): HTTP {status} {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    /// 语句执行失败
    #[error("存储语句执行失败 ({operation}): {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },
    /// 更新目标不存在
    #[error("条目不存在: {id}")]
    NotFound { id: String },
    /// 响应解析失败
    #[error("存储响应解析失败: {0}")]
    Decode(String),
    /// 状态转换不合法
    #[error("条目 {id} 状态转换不合法: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
    /// 人为注入的故障
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

/// 页面抓取错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 页面在限定时间内未完成加载
    #[error("导航超时 ({timeout_ms}ms): {url}")]
    NavigationTimeout { url: String, timeout_ms: u64 },
    /// 导航失败
    #[error("导航到 {url} 失败: {message}")]
    Navigation { url: String, message: String },
    /// 创建页面失败
    #[error("创建页面失败: {0}")]
    PageCreation(String),
    /// 执行页面脚本失败
    #[error("执行页面脚本失败: {0}")]
    Script(String),
}

/// 浏览器启动错误，对整次运行是致命的
#[derive(Debug, Error)]
pub enum BrowserLaunchError {
    /// 浏览器配置失败
    #[error("配置无头浏览器失败: {0}")]
    Config(String),
    /// 启动失败
    #[error("启动无头浏览器失败: {0}")]
    Launch(#[from] chromiumoxide::error::CdpError),
    /// 其他启动器实现的失败
    #[error("启动浏览器失败: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置值不合法: {0}")]
    Invalid(String),
}

/// 本地结果日志错误
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("读写结果日志失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("结果日志序列化失败: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
