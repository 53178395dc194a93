//! 节流写入 - 业务能力层
//!
//! 把一批记录 upsert 到一个容器，逐个校验响应状态

use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::{ContainerRef, DocumentStore, UpsertResponse};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// 写入方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// 同时发出全部 upsert
    Parallel,
    /// 一次一个，两次操作之间等待 `delay`
    Serialized { delay: Duration },
}

/// 一批写入的结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// 新建的记录数（201）
    pub created: usize,
    /// 覆盖的记录数（其它 2xx）
    pub replaced: usize,
}

impl WriteSummary {
    pub fn written(&self) -> usize {
        self.created + self.replaced
    }

    fn record(&mut self, status_code: u16) {
        if status_code == 201 {
            self.created += 1;
        } else {
            self.replaced += 1;
        }
    }
}

/// 节流写入器
///
/// 职责：
/// - 按写入方式 upsert 一批记录
/// - 校验每个响应；第一个失败即终止，报告状态码和记录内容
/// - 不重试，不回滚已写入的记录
pub struct ThrottledWriter {
    store: Arc<dyn DocumentStore>,
}

impl ThrottledWriter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn write_batch<T: Serialize>(
        &self,
        container: &ContainerRef,
        records: &[T],
        mode: WriteMode,
    ) -> AppResult<WriteSummary> {
        let documents = records
            .iter()
            .map(|record| {
                serde_json::to_value(record).map_err(|source| {
                    AppError::from(StoreError::MalformedDocument {
                        container: container.to_string(),
                        source,
                    })
                })
            })
            .collect::<AppResult<Vec<Value>>>()?;

        if documents.is_empty() {
            debug!("{} 没有需要写入的记录", container);
            return Ok(WriteSummary::default());
        }

        match mode {
            WriteMode::Parallel => self.write_parallel(container, &documents).await,
            WriteMode::Serialized { delay } => {
                self.write_serialized(container, &documents, delay).await
            }
        }
    }

    async fn write_serialized(
        &self,
        container: &ContainerRef,
        documents: &[Value],
        delay: Duration,
    ) -> AppResult<WriteSummary> {
        let total = documents.len();
        let mut summary = WriteSummary::default();

        for (idx, document) in documents.iter().enumerate() {
            if idx > 0 {
                sleep(delay).await;
            }

            let response = self.store.upsert(container, document).await?;
            check_status(container, document, &response)?;
            summary.record(response.status_code);

            info!(
                "[{}/{}] ✓ {} 写入 {} (status {})",
                idx + 1,
                total,
                container.container,
                document_label(document),
                response.status_code
            );
        }

        Ok(summary)
    }

    async fn write_parallel(
        &self,
        container: &ContainerRef,
        documents: &[Value],
    ) -> AppResult<WriteSummary> {
        info!(
            "🚀 并发写入 {} 条记录到 {}",
            documents.len(),
            container.container
        );

        let results = join_all(
            documents
                .iter()
                .map(|document| self.store.upsert(container, document)),
        )
        .await;

        let mut summary = WriteSummary::default();
        for (document, result) in documents.iter().zip(results) {
            let response = result?;
            check_status(container, document, &response)?;
            summary.record(response.status_code);
        }

        info!("✓ {} 写入完成: {} 条", container.container, summary.written());
        Ok(summary)
    }
}

fn check_status(container: &ContainerRef, document: &Value, response: &UpsertResponse) -> AppResult<()> {
    if response.is_success() {
        return Ok(());
    }

    error!(
        "❌ {} 写入 {} 失败: status {} {}",
        container.container,
        document_label(document),
        response.status_code,
        response.message.as_deref().unwrap_or_default()
    );
    Err(StoreError::WriteFailed {
        container: container.container.clone(),
        status: response.status_code,
        record: document.to_string(),
    }
    .into())
}

fn document_label(document: &Value) -> &str {
    document.get("id").and_then(Value::as_str).unwrap_or("<no id>")
}
