//! 文档存储 - 基础设施层
//!
//! 只暴露"建库建表 / 查询 / upsert"能力，不认识 Test / Question

use crate::error::{AppError, AppResult, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// 存储客户端的角色
///
/// 查询和写入使用两个不同配置的客户端，只读客户端拒绝任何写操作
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreRole {
    ReadOnly,
    ReadWrite,
}

impl StoreRole {
    /// 写操作前检查角色
    pub fn check_writable(self, operation: &str) -> AppResult<()> {
        match self {
            StoreRole::ReadWrite => Ok(()),
            StoreRole::ReadOnly => Err(StoreError::ReadOnlyClient {
                operation: operation.to_string(),
            }
            .into()),
        }
    }
}

/// 数据库中的一个容器
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub database: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.container)
    }
}

/// 查询条件：若干字段等值条件的合取，空条件表示全表扫描
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentFilter {
    conditions: Vec<(String, Value)>,
}

impl DocumentFilter {
    /// 全表扫描
    pub fn all() -> Self {
        Self::default()
    }

    /// 单字段等值
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    /// 追加一个等值条件
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_all(&self) -> bool {
        self.conditions.is_empty()
    }

    /// 文档是否满足全部条件
    pub fn matches(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }

    /// 转换为参数化 SQL 查询
    ///
    /// 字段名使用 `c["field"]` 形式，值全部走参数
    pub fn to_sql(&self) -> (String, Vec<(String, Value)>) {
        if self.conditions.is_empty() {
            return ("SELECT * FROM c".to_string(), Vec::new());
        }

        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut parameters = Vec::with_capacity(self.conditions.len());
        for (idx, (field, value)) in self.conditions.iter().enumerate() {
            let name = format!("@p{}", idx);
            clauses.push(format!("c[{}] = {}", Value::from(field.as_str()), name));
            parameters.push((name, value.clone()));
        }

        (
            format!("SELECT * FROM c WHERE {}", clauses.join(" AND ")),
            parameters,
        )
    }
}

/// upsert 的响应，状态码由调用方校验
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpsertResponse {
    pub status_code: u16,
    /// 非成功响应时服务端返回的消息
    pub message: Option<String>,
}

impl UpsertResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// 文档存储能力
///
/// 职责：
/// - 幂等地创建数据库和容器（分区键 `/id`）
/// - 按条件查询文档；容器尚不存在时返回空结果
/// - upsert 单个文档并如实返回状态码
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn role(&self) -> StoreRole;

    async fn ensure_database(&self, database: &str) -> AppResult<()>;

    async fn ensure_container(&self, container: &ContainerRef) -> AppResult<()>;

    async fn query(
        &self,
        container: &ContainerRef,
        filter: &DocumentFilter,
    ) -> AppResult<Vec<Value>>;

    async fn upsert(&self, container: &ContainerRef, document: &Value)
        -> AppResult<UpsertResponse>;
}

/// 查询并反序列化为指定类型
pub async fn query_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    container: &ContainerRef,
    filter: &DocumentFilter,
) -> AppResult<Vec<T>> {
    parse_documents(container, store.query(container, filter).await?)
}

/// 把查询结果反序列化为指定类型
pub fn parse_documents<T: DeserializeOwned>(
    container: &ContainerRef,
    documents: Vec<Value>,
) -> AppResult<Vec<T>> {
    documents
        .into_iter()
        .map(|document| {
            serde_json::from_value(document).map_err(|source| {
                AppError::from(StoreError::MalformedDocument {
                    container: container.to_string(),
                    source,
                })
            })
        })
        .collect()
}

/// 取文档 id（upsert 的分区键）
pub(crate) fn document_id<'a>(container: &ContainerRef, document: &'a Value) -> AppResult<&'a str> {
    document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            StoreError::MissingId {
                container: container.to_string(),
            }
            .into()
        })
}
