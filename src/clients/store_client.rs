/// 远程条目存储客户端
///
/// 通过 HTTP 管道接口执行参数化 SQL，所有值都以命名参数绑定。
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::wire::{NamedArg, PipelineRequest, PipelineResponse, Row, SqlValue};
use super::WorkStore;
use crate::config::{is_sql_identifier, Config};
use crate::error::{ConfigError, StoreError};
use crate::models::{ItemStatus, ItemUpdate, WorkItem};

const ITEM_COLUMNS: &str =
    "id, source_url, extracted_content, attempt_count, last_status, last_error, processed_at, stop_retrying";

/// libSQL 远程存储客户端
pub struct HttpStore {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
    table: String,
}

impl HttpStore {
    /// 根据配置创建客户端
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        if !is_sql_identifier(&config.store_table) {
            return Err(ConfigError::Invalid(format!(
                "store_table 不是合法的表名: {}",
                config.store_table
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.store_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            client,
            endpoint: pipeline_endpoint(&config.store_url),
            auth_token: config.store_auth_token.clone(),
            table: config.store_table.clone(),
        })
    }

    /// 执行单条语句
    async fn execute(
        &self,
        operation: &'static str,
        sql: &str,
        args: Vec<NamedArg>,
    ) -> Result<super::wire::ExecuteResult, StoreError> {
        let body = PipelineRequest::single(sql, args);
        debug!("执行存储语句 ({}): {}", operation, sql);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| StoreError::Transport { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("存储返回错误状态 ({}): {}", operation, status);
            return Err(StoreError::Status {
                operation,
                status: status.as_u16(),
                body: crate::utils::truncate_text(&body, 200),
            });
        }

        let parsed: PipelineResponse = response
            .json()
            .await
            .map_err(|source| StoreError::Transport { operation, source })?;

        parsed.into_execute_result(operation)
    }
}

#[async_trait]
impl WorkStore for HttpStore {
    async fn fetch_pending(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let sql = fetch_pending_sql(&self.table);
        let args = vec![
            NamedArg::new("pending", SqlValue::text(ItemStatus::Pending.as_str())),
            NamedArg::new("failed", SqlValue::text(ItemStatus::Failed.as_str())),
            NamedArg::new("attempting", SqlValue::text(ItemStatus::Attempting.as_str())),
            NamedArg::new("max_attempts", SqlValue::integer(i64::from(max_attempts))),
            NamedArg::new("limit", SqlValue::integer(limit as i64)),
        ];

        let result = self.execute("fetch_pending", &sql, args).await?;
        let items = result
            .into_rows()
            .into_iter()
            .map(|row| decode_item(&row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("拉取到 {} 个待处理条目", items.len());
        Ok(items)
    }

    async fn apply_update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        let Some((sql, args)) = update_statement(&self.table, id, update) else {
            return Ok(());
        };

        let result = self.execute("apply_update", &sql, args).await?;
        if result.affected_row_count > 0 {
            return Ok(());
        }

        // 没有行被更新：条目不存在，或者被状态守卫拒绝
        match self.current_status(id).await? {
            None => Err(StoreError::NotFound { id: id.to_string() }),
            Some(from) => {
                warn!("[条目 {}] 存储拒绝了状态 {} 上的更新", id, from);
                Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from: from.to_string(),
                    to: update.last_status.unwrap_or(from).to_string(),
                })
            }
        }
    }
}

impl HttpStore {
    async fn current_status(&self, id: &str) -> Result<Option<ItemStatus>, StoreError> {
        let sql = format!("SELECT last_status FROM {} WHERE id = :id", self.table);
        let args = vec![NamedArg::new("id", SqlValue::text(id))];
        let result = self.execute("current_status", &sql, args).await?;

        let Some(row) = result.into_rows().into_iter().next() else {
            return Ok(None);
        };
        match row.opt_text("last_status") {
            Some(s) => s.parse().map(Some).map_err(StoreError::Decode),
            None => Ok(Some(ItemStatus::Pending)),
        }
    }
}

/// `libsql://` 地址换成 HTTPS，并补上管道路径
fn pipeline_endpoint(store_url: &str) -> String {
    let base = store_url.trim().trim_end_matches('/');
    let base = match base.strip_prefix("libsql://") {
        Some(host) => format!("https://{}", host),
        None => base.to_string(),
    };
    if base.ends_with("/v2/pipeline") {
        base
    } else {
        format!("{}/v2/pipeline", base)
    }
}

fn fetch_pending_sql(table: &str) -> String {
    format!(
        "SELECT {ITEM_COLUMNS} FROM {table} \
         WHERE (last_status = :pending \
                OR (last_status IN (:failed, :attempting) AND attempt_count < :max_attempts)) \
           AND COALESCE(stop_retrying, 0) = 0 \
           AND (extracted_content IS NULL OR extracted_content = '') \
         ORDER BY created_at DESC \
         LIMIT :limit"
    )
}

/// 只为提供了值的字段生成 SET 子句；没有字段时返回 `None`
///
/// 写状态时只匹配状态机允许的前驱状态，写正文时只匹配尚无正文的行，
/// 被拒绝的更新影响 0 行。
fn update_statement(
    table: &str,
    id: &str,
    update: &ItemUpdate,
) -> Option<(String, Vec<NamedArg>)> {
    let mut assignments = Vec::new();
    let mut args = Vec::new();
    let mut set = |column: &'static str, value: SqlValue| {
        assignments.push(format!("{column} = :{column}"));
        args.push(NamedArg::new(column, value));
    };

    if let Some(content) = &update.extracted_content {
        set("extracted_content", SqlValue::text(content.as_str()));
    }
    if let Some(count) = update.attempt_count {
        set("attempt_count", SqlValue::integer(i64::from(count)));
    }
    if let Some(status) = update.last_status {
        set("last_status", SqlValue::text(status.as_str()));
    }
    if let Some(error) = &update.last_error {
        set("last_error", SqlValue::opt_text(error.as_deref()));
    }
    if let Some(at) = update.processed_at {
        set("processed_at", SqlValue::text(at.to_rfc3339()));
    }
    if let Some(stop) = update.stop_retrying {
        set("stop_retrying", SqlValue::integer(i64::from(stop)));
    }

    if assignments.is_empty() {
        return None;
    }

    let mut guards = vec!["id = :id".to_string()];
    if let Some(status) = update.last_status {
        let from = ItemStatus::predecessors(status);
        if from.is_empty() {
            guards.push("1 = 0".to_string());
        } else {
            args.push(NamedArg::new(
                "default_status",
                SqlValue::text(ItemStatus::Pending.as_str()),
            ));
            let mut names = Vec::new();
            for (i, s) in from.iter().enumerate() {
                let name = format!("from_{}", i);
                names.push(format!(":{}", name));
                args.push(NamedArg::new(&name, SqlValue::text(s.as_str())));
            }
            guards.push(format!(
                "COALESCE(last_status, :default_status) IN ({})",
                names.join(", ")
            ));
        }
    }
    if update.extracted_content.is_some() {
        guards.push("(extracted_content IS NULL OR extracted_content = '')".to_string());
    }

    args.push(NamedArg::new("id", SqlValue::text(id)));
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        guards.join(" AND ")
    );
    Some((sql, args))
}

fn decode_item(row: &Row) -> Result<WorkItem, StoreError> {
    let id = row.text("id")?;
    let source_url = row.text("source_url")?;
    if source_url.trim().is_empty() {
        return Err(StoreError::Decode(format!("条目 {} 缺少 source_url", id)));
    }

    let last_status = match row.opt_text("last_status") {
        Some(s) => s.parse::<ItemStatus>().map_err(StoreError::Decode)?,
        None => ItemStatus::Pending,
    };

    let attempt_count = match row.int("attempt_count") {
        Some(n) => u32::try_from(n).map_err(|_| {
            StoreError::Decode(format!("条目 {} 的 attempt_count 超出范围: {}", id, n))
        })?,
        None => 0,
    };

    let processed_at = row
        .opt_text("processed_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(WorkItem {
        id,
        source_url,
        extracted_content: row.opt_text("extracted_content"),
        attempt_count,
        last_status,
        last_error: row.opt_text("last_error"),
        processed_at,
        stop_retrying: row.int("stop_retrying").unwrap_or(0) != 0,
    })
}
