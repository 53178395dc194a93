//! 进程内文档存储
//!
//! 与 Cosmos 客户端行为一致的内存实现：建库建表幂等、未建表查询返回空、
//! 写入未建的容器返回 404。可注入写入失败，并统计每类操作次数。

use crate::error::AppResult;
use crate::infrastructure::document_store::{
    document_id, ContainerRef, DocumentFilter, DocumentStore, StoreRole, UpsertResponse,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 操作计数
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub ensure_calls: usize,
    pub queries: usize,
    pub upserts: usize,
}

impl StoreStats {
    /// 总访问次数
    pub fn total(&self) -> usize {
        self.ensure_calls + self.queries + self.upserts
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    databases: HashSet<String>,
    containers: HashMap<ContainerRef, BTreeMap<String, Value>>,
    /// 文档 id → 注入的失败状态码
    failures: HashMap<String, u16>,
    /// 成功写入的 (容器, id)，按写入顺序
    upsert_log: Vec<(String, String)>,
    stats: StoreStats,
}

/// 内存文档存储
///
/// `clone()` 和 [`MemoryStore::read_only`] 得到的句柄共享同一份数据
#[derive(Clone, Debug)]
pub struct MemoryStore {
    role: StoreRole,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// 创建读写存储
    pub fn new() -> Self {
        Self {
            role: StoreRole::ReadWrite,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// 共享数据的只读句柄
    pub fn read_only(&self) -> Self {
        Self {
            role: StoreRole::ReadOnly,
            state: Arc::clone(&self.state),
        }
    }

    /// 直接放入文档（建好库和容器），用于准备已有数据
    pub async fn seed(&self, container: &ContainerRef, documents: Vec<Value>) {
        let mut state = self.state.lock().await;
        state.databases.insert(container.database.clone());
        let docs = state.containers.entry(container.clone()).or_default();
        for document in documents {
            if let Some(id) = document.get("id").and_then(Value::as_str) {
                docs.insert(id.to_string(), document);
            }
        }
    }

    /// 之后写入该 id 时返回指定状态码
    pub async fn fail_upsert(&self, id: impl Into<String>, status_code: u16) {
        self.state
            .lock()
            .await
            .failures
            .insert(id.into(), status_code);
    }

    /// 容器中的全部文档（按 id 排序）
    pub async fn documents(&self, container: &ContainerRef) -> Vec<Value> {
        self.state
            .lock()
            .await
            .containers
            .get(container)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn stats(&self) -> StoreStats {
        self.state.lock().await.stats.clone()
    }

    /// 成功写入的 (容器, id) 序列
    pub async fn upsert_log(&self) -> Vec<(String, String)> {
        self.state.lock().await.upsert_log.clone()
    }

    /// 清空计数和写入记录，保留数据
    pub async fn reset_stats(&self) {
        let mut state = self.state.lock().await;
        state.stats = StoreStats::default();
        state.upsert_log.clear();
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn role(&self) -> StoreRole {
        self.role
    }

    async fn ensure_database(&self, database: &str) -> AppResult<()> {
        self.role.check_writable("create database")?;
        let mut state = self.state.lock().await;
        state.stats.ensure_calls += 1;
        state.databases.insert(database.to_string());
        Ok(())
    }

    async fn ensure_container(&self, container: &ContainerRef) -> AppResult<()> {
        self.role.check_writable("create container")?;
        let mut state = self.state.lock().await;
        state.stats.ensure_calls += 1;
        state.containers.entry(container.clone()).or_default();
        Ok(())
    }

    async fn query(
        &self,
        container: &ContainerRef,
        filter: &DocumentFilter,
    ) -> AppResult<Vec<Value>> {
        let mut state = self.state.lock().await;
        state.stats.queries += 1;
        Ok(state
            .containers
            .get(container)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert(
        &self,
        container: &ContainerRef,
        document: &Value,
    ) -> AppResult<UpsertResponse> {
        self.role.check_writable("upsert")?;
        let id = document_id(container, document)?.to_string();

        let mut state = self.state.lock().await;
        state.stats.upserts += 1;

        if let Some(&status_code) = state.failures.get(&id) {
            return Ok(UpsertResponse {
                status_code,
                message: Some(format!("injected failure for {}", id)),
            });
        }

        let Some(docs) = state.containers.get_mut(container) else {
            return Ok(UpsertResponse {
                status_code: 404,
                message: Some(format!("container {} not found", container)),
            });
        };

        let status_code = if docs.insert(id.clone(), document.clone()).is_some() {
            200
        } else {
            201
        };
        state.upsert_log.push((container.container.clone(), id));

        Ok(UpsertResponse {
            status_code,
            message: None,
        })
    }
}
