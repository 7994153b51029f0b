//! libSQL 远程管道协议的请求/响应结构

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Serialize)]
pub(crate) struct PipelineRequest<'a> {
    pub requests: Vec<StreamRequest<'a>>,
}

impl<'a> PipelineRequest<'a> {
    /// 单条语句加关闭流，保证一次调用对应一次远程执行
    pub fn single(sql: &'a str, named_args: Vec<NamedArg>) -> Self {
        Self {
            requests: vec![
                StreamRequest::Execute {
                    stmt: Statement { sql, named_args },
                },
                StreamRequest::Close,
            ],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum StreamRequest<'a> {
    Execute { stmt: Statement<'a> },
    Close,
}

#[derive(Debug, Serialize)]
pub(crate) struct Statement<'a> {
    pub sql: &'a str,
    pub named_args: Vec<NamedArg>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NamedArg {
    pub name: String,
    pub value: SqlValue,
}

impl NamedArg {
    pub fn new(name: &str, value: SqlValue) -> Self {
        Self {
            name: format!(":{}", name),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum SqlValue {
    Null,
    Integer { value: IntegerRepr },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

/// 整数在协议里以字符串传输，但也接受裸数字
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum IntegerRepr {
    Str(String),
    Num(i64),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text {
            value: value.into(),
        }
    }

    pub fn integer(value: i64) -> Self {
        SqlValue::Integer {
            value: IntegerRepr::Str(value.to_string()),
        }
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(SqlValue::Null, SqlValue::text)
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer {
                value: IntegerRepr::Num(n),
            } => Some(*n),
            SqlValue::Integer {
                value: IntegerRepr::Str(s),
            } => s.parse().ok(),
            SqlValue::Float { value } => Some(*value as i64),
            SqlValue::Text { value } => value.trim().parse().ok(),
            _ => None,
        }
    }

    fn into_string(self) -> Option<String> {
        match self {
            SqlValue::Text { value } => Some(value),
            SqlValue::Integer { .. } => self.as_i64().map(|n| n.to_string()),
            SqlValue::Float { value } => Some(value.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PipelineResponse {
    pub results: Vec<StreamResult>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: RemoteError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum StreamResponse {
    Execute { result: ExecuteResult },
    Close,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemoteError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecuteResult {
    #[serde(default)]
    pub cols: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<SqlValue>>,
    #[serde(default)]
    pub affected_row_count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Column {
    pub name: Option<String>,
}

impl PipelineResponse {
    /// 取出第一条 execute 结果；任一结果为 error 时返回该错误
    pub fn into_execute_result(self, operation: &'static str) -> Result<ExecuteResult, StoreError> {
        let mut execute = None;
        for result in self.results {
            match result {
                StreamResult::Error { error } => {
                    return Err(StoreError::Remote {
                        operation,
                        message: error.message,
                    })
                }
                StreamResult::Ok {
                    response: StreamResponse::Execute { result },
                } if execute.is_none() => execute = Some(result),
                StreamResult::Ok { .. } => {}
            }
        }
        execute.ok_or_else(|| StoreError::Decode(format!("{} 响应缺少 execute 结果", operation)))
    }
}

/// 按列名读取一行
pub(crate) struct Row {
    values: HashMap<String, SqlValue>,
}

impl ExecuteResult {
    pub fn into_rows(self) -> Vec<Row> {
        let names: Vec<String> = self
            .cols
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.name.unwrap_or_else(|| format!("col{}", i)))
            .collect();
        self.rows
            .into_iter()
            .map(|row| Row {
                values: names.iter().cloned().zip(row).collect(),
            })
            .collect()
    }
}

impl Row {
    pub fn text(&self, column: &str) -> Result<String, StoreError> {
        self.opt_text(column)
            .ok_or_else(|| StoreError::Decode(format!("列 {} 为空或不存在", column)))
    }

    pub fn opt_text(&self, column: &str) -> Option<String> {
        self.values.get(column).cloned().and_then(SqlValue::into_string)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.values.get(column).and_then(SqlValue::as_i64)
    }
}
