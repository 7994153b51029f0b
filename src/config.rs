use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

static SQL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile")
});

/// 程序配置
///
/// 所有批处理参数都通过这个结构显式传入各组件，不存在进程级可变全局量。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 单篇正文的字符预算
    pub max_chars: usize,
    /// 重试上限
    pub max_attempts: u32,
    /// 每次运行拉取并并发处理的条目数
    pub batch_size: usize,
    /// 单页导航超时（毫秒）
    pub page_timeout_ms: u64,
    /// 页面加载完成后的额外等待（毫秒）
    pub settle_delay_ms: u64,
    /// 抓取时使用的固定客户端标识
    pub user_agent: String,
    // --- 存储配置 ---
    pub store_url: String,
    pub store_auth_token: Option<String>,
    pub store_table: String,
    pub store_timeout_ms: u64,
    // --- 浏览器配置 ---
    pub chrome_executable: Option<String>,
    pub headless: bool,
    /// 未能写回存储的结果的本地日志路径，为空时禁用
    pub outcome_journal: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_chars: 5000,
            max_attempts: 3,
            batch_size: 5,
            page_timeout_ms: 30_000,
            settle_delay_ms: 2_000,
            user_agent: "article-extract/0.1 (+content extraction bot)".to_string(),
            store_url: "http://127.0.0.1:8080".to_string(),
            store_auth_token: None,
            store_table: "articles".to_string(),
            store_timeout_ms: 15_000,
            chrome_executable: None,
            headless: true,
            outcome_journal: Some("unflushed_outcomes.jsonl".to_string()),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认值叠加环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段取默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// 先读文件（如有），再叠加环境变量，最后校验
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 叠加环境变量；数值或布尔变量无法解析时报错，不静默回落到原值
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            max_chars: env_parse("EXTRACT_MAX_CHARS")?.unwrap_or(self.max_chars),
            max_attempts: env_parse("EXTRACT_MAX_ATTEMPTS")?.unwrap_or(self.max_attempts),
            batch_size: env_parse("EXTRACT_BATCH_SIZE")?.unwrap_or(self.batch_size),
            page_timeout_ms: env_parse("EXTRACT_PAGE_TIMEOUT_MS")?.unwrap_or(self.page_timeout_ms),
            settle_delay_ms: env_parse("EXTRACT_SETTLE_DELAY_MS")?.unwrap_or(self.settle_delay_ms),
            user_agent: std::env::var("USER_AGENT").unwrap_or(self.user_agent),
            store_url: std::env::var("STORE_URL").unwrap_or(self.store_url),
            store_auth_token: std::env::var("STORE_AUTH_TOKEN").ok().or(self.store_auth_token),
            store_table: std::env::var("STORE_TABLE").unwrap_or(self.store_table),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS")?.unwrap_or(self.store_timeout_ms),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(self.chrome_executable),
            headless: env_parse("EXTRACT_HEADLESS")?.unwrap_or(self.headless),
            outcome_journal: match std::env::var("OUTCOME_JOURNAL") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v),
                Err(_) => self.outcome_journal,
            },
            verbose_logging: env_parse("VERBOSE_LOGGING")?.unwrap_or(self.verbose_logging),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chars == 0 {
            return Err(ConfigError::Invalid("max_chars 必须大于 0".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts 必须大于 0".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size 必须大于 0".into()));
        }
        if self.page_timeout_ms == 0 {
            return Err(ConfigError::Invalid("page_timeout_ms 必须大于 0".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store_timeout_ms 必须大于 0".into()));
        }
        if !is_sql_identifier(&self.store_table) {
            return Err(ConfigError::Invalid(format!(
                "store_table 不是合法的表名: {}",
                self.store_table
            )));
        }
        if self.store_url.trim().is_empty() {
            return Err(ConfigError::Invalid("store_url 不能为空".into()));
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

pub(crate) fn is_sql_identifier(name: &str) -> bool {
    SQL_IDENTIFIER.is_match(name)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse_override(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("环境变量 {} 的值无法解析: {:?}", name, raw))
    })
}
