//! Cosmos DB REST 客户端 - 基础设施层
//!
//! 使用主密钥签名访问 SQL API。每个客户端在创建时固定一个 [`StoreRole`]，
//! 查询用只读密钥，写入用读写密钥，两者互不混用。

use crate::error::{AppError, AppResult, ConfigError, StoreError};
use crate::infrastructure::document_store::{
    document_id, ContainerRef, DocumentFilter, DocumentStore, StoreRole, UpsertResponse,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// Cosmos DB 客户端
///
/// 职责：
/// - 为每个请求生成主密钥签名
/// - 建库、建容器（409 视为已存在）
/// - 参数化查询并跟随 continuation 分页
/// - 按 id 分区键 upsert
pub struct CosmosStore {
    client: reqwest::Client,
    endpoint: String,
    signer: HmacSha256,
    role: StoreRole,
}

impl CosmosStore {
    /// 创建客户端
    ///
    /// # 参数
    /// - `endpoint`: 账户地址，如 `https://localhost:8081`
    /// - `master_key`: base64 编码的主密钥
    /// - `role`: 客户端角色
    /// - `accept_invalid_certs`: 本地模拟器使用自签名证书
    pub fn new(
        endpoint: &str,
        master_key: &str,
        role: StoreRole,
        accept_invalid_certs: bool,
    ) -> AppResult<Self> {
        let key = STANDARD
            .decode(master_key.trim())
            .map_err(|e| ConfigError::InvalidStoreKey {
                reason: e.to_string(),
            })?;
        let signer = HmacSha256::new_from_slice(&key).map_err(|e| ConfigError::InvalidStoreKey {
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| AppError::store_request_failed("build client", e))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            signer,
            role,
        })
    }

    /// 生成 Authorization 头
    ///
    /// 签名内容为 `verb\nresourceType\nresourceLink\ndate\n\n`，
    /// 除 resourceLink 外全部小写
    fn authorization(&self, verb: &Method, resource_type: &str, resource_link: &str, date: &str) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.as_str().to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac = self.signer.clone();
        mac.update(payload.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        urlencoding::encode(&format!("type=master&ver=1.0&sig={}", signature)).into_owned()
    }

    fn request(&self, method: Method, path: &str, resource_type: &str, resource_link: &str) -> RequestBuilder {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.authorization(&method, resource_type, resource_link, &date);

        self.client
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
    }

    /// 创建资源，201 和 409 都算成功
    async fn create_if_not_exists(
        &self,
        operation: &str,
        path: &str,
        resource_type: &str,
        resource_link: &str,
        body: Value,
    ) -> AppResult<()> {
        self.role.check_writable(operation)?;

        let response = self
            .request(Method::POST, path, resource_type, resource_link)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::store_request_failed(operation, e))?;

        match response.status() {
            status if status.is_success() => {
                debug!("{} 已创建", operation);
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!("{} 已存在", operation);
                Ok(())
            }
            _ => Err(bad_response(operation, response).await),
        }
    }
}

#[async_trait]
impl DocumentStore for CosmosStore {
    fn role(&self) -> StoreRole {
        self.role
    }

    async fn ensure_database(&self, database: &str) -> AppResult<()> {
        self.create_if_not_exists(
            &format!("create database {}", database),
            "dbs",
            "dbs",
            "",
            json!({ "id": database }),
        )
        .await
    }

    async fn ensure_container(&self, container: &ContainerRef) -> AppResult<()> {
        let db_link = format!("dbs/{}", container.database);
        self.create_if_not_exists(
            &format!("create container {}", container),
            &format!("{}/colls", db_link),
            "colls",
            &db_link,
            json!({
                "id": container.container,
                "partitionKey": { "paths": ["/id"], "kind": "Hash" }
            }),
        )
        .await
    }

    async fn query(
        &self,
        container: &ContainerRef,
        filter: &DocumentFilter,
    ) -> AppResult<Vec<Value>> {
        let operation = format!("query {}", container);
        let coll_link = format!("dbs/{}/colls/{}", container.database, container.container);
        let (sql, parameters) = filter.to_sql();
        let body = json!({
            "query": sql,
            "parameters": parameters
                .into_iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect::<Vec<_>>(),
        });

        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::POST, &format!("{}/docs", coll_link), "docs", &coll_link)
                .header("x-ms-documentdb-isquery", "True")
                .header("x-ms-documentdb-query-enablecrosspartition", "True")
                .header("content-type", "application/query+json")
                .body(body.to_string());
            if let Some(token) = &continuation {
                request = request.header("x-ms-continuation", token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| AppError::store_request_failed(operation.clone(), e))?;

            if response.status() == StatusCode::NOT_FOUND {
                // 库或容器尚未创建：还没有任何已存储记录
                debug!("{} 不存在，视为空结果", container);
                return Ok(Vec::new());
            }
            if !response.status().is_success() {
                return Err(bad_response(&operation, response).await);
            }

            continuation = response
                .headers()
                .get("x-ms-continuation")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let page: QueryPage = response
                .json()
                .await
                .map_err(|e| AppError::store_request_failed(operation.clone(), e))?;
            documents.extend(page.documents.into_iter().map(strip_system_fields));

            if continuation.is_none() {
                break;
            }
        }

        debug!("{} 返回 {} 个文档", operation, documents.len());
        Ok(documents)
    }

    async fn upsert(
        &self,
        container: &ContainerRef,
        document: &Value,
    ) -> AppResult<UpsertResponse> {
        self.role.check_writable("upsert")?;
        let id = document_id(container, document)?;
        let coll_link = format!("dbs/{}/colls/{}", container.database, container.container);

        let response = self
            .request(Method::POST, &format!("{}/docs", coll_link), "docs", &coll_link)
            .header("x-ms-documentdb-is-upsert", "True")
            .header("x-ms-documentdb-partitionkey", json!([id]).to_string())
            .json(document)
            .send()
            .await
            .map_err(|e| AppError::store_request_failed(format!("upsert {}", container), e))?;

        let status_code = response.status().as_u16();
        let message = if response.status().is_success() {
            None
        } else {
            Some(response.text().await.unwrap_or_default())
        };

        Ok(UpsertResponse {
            status_code,
            message,
        })
    }
}

async fn bad_response(operation: &str, response: Response) -> AppError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StoreError::BadResponse {
        operation: operation.to_string(),
        status,
        message,
    }
    .into()
}

/// 去掉 `_rid`、`_etag` 等系统字段
fn strip_system_fields(mut document: Value) -> Value {
    if let Some(object) = document.as_object_mut() {
        object.retain(|key, _| !key.starts_with('_'));
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EMULATOR_MASTER_KEY;
    use mockito::{Matcher, Server};

    fn store(url: &str, role: StoreRole) -> CosmosStore {
        CosmosStore::new(url, EMULATOR_MASTER_KEY, role, false).unwrap()
    }

    #[test]
    fn test_invalid_master_key_is_config_error() {
        let err = CosmosStore::new("http://localhost", "not base64!", StoreRole::ReadOnly, false)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::InvalidStoreKey { .. })
        ));
    }

    #[test]
    fn test_authorization_is_url_encoded_master_token() {
        let store = store("http://localhost", StoreRole::ReadOnly);
        let token = store.authorization(
            &Method::GET,
            "dbs",
            "dbs/Users",
            "Tue, 01 Nov 1994 08:12:31 GMT",
        );
        assert!(token.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"));

        // 同样的输入得到同样的签名
        let again = store.authorization(
            &Method::GET,
            "dbs",
            "dbs/Users",
            "Tue, 01 Nov 1994 08:12:31 GMT",
        );
        assert_eq!(token, again);
    }

    #[tokio::test]
    async fn test_ensure_database_accepts_conflict() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/dbs")
            .match_header("x-ms-version", API_VERSION)
            .with_status(409)
            .create_async()
            .await;

        store(&server.url(), StoreRole::ReadWrite)
            .ensure_database("Users")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ensure_container_uses_id_partition_key() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/dbs/Users/colls")
            .match_body(Matcher::PartialJson(json!({
                "id": "Question",
                "partitionKey": { "paths": ["/id"] }
            })))
            .with_status(201)
            .create_async()
            .await;

        store(&server.url(), StoreRole::ReadWrite)
            .ensure_container(&ContainerRef::new("Users", "Question"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_follows_continuation_and_strips_system_fields() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/dbs/Users/colls/Question/docs")
            .match_header("x-ms-documentdb-isquery", "True")
            .match_header("x-ms-continuation", Matcher::Missing)
            .with_status(200)
            .with_header("x-ms-continuation", "page-2")
            .with_body(r#"{"Documents":[{"id":"t_1","testId":"t","_rid":"x","_ts":1}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/dbs/Users/colls/Question/docs")
            .match_header("x-ms-continuation", "page-2")
            .with_status(200)
            .with_body(r#"{"Documents":[{"id":"t_2","testId":"t","_etag":"e"}]}"#)
            .create_async()
            .await;

        let docs = store(&server.url(), StoreRole::ReadOnly)
            .query(
                &ContainerRef::new("Users", "Question"),
                &DocumentFilter::eq("testId", "t"),
            )
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(
            docs,
            vec![
                json!({"id": "t_1", "testId": "t"}),
                json!({"id": "t_2", "testId": "t"})
            ]
        );
    }

    #[tokio::test]
    async fn test_query_missing_container_is_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/dbs/Users/colls/Test/docs")
            .with_status(404)
            .create_async()
            .await;

        let docs = store(&server.url(), StoreRole::ReadOnly)
            .query(&ContainerRef::new("Users", "Test"), &DocumentFilter::all())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_query_server_error_is_bad_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/dbs/Users/colls/Test/docs")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = store(&server.url(), StoreRole::ReadOnly)
            .query(&ContainerRef::new("Users", "Test"), &DocumentFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Store(StoreError::BadResponse { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_upsert_sends_partition_key_and_reports_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/dbs/Users/colls/Question/docs")
            .match_header("x-ms-documentdb-is-upsert", "True")
            .match_header("x-ms-documentdb-partitionkey", r#"["t_1"]"#)
            .with_status(429)
            .with_body("Request rate is large")
            .create_async()
            .await;

        let response = store(&server.url(), StoreRole::ReadWrite)
            .upsert(
                &ContainerRef::new("Users", "Question"),
                &json!({"id": "t_1", "testId": "t"}),
            )
            .await
            .unwrap();
        assert_eq!(response.status_code, 429);
        assert_eq!(response.message.as_deref(), Some("Request rate is large"));
    }

    #[tokio::test]
    async fn test_read_only_client_never_sends_writes() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let reader = store(&server.url(), StoreRole::ReadOnly);
        assert!(reader.ensure_database("Users").await.is_err());
        assert!(reader
            .upsert(&ContainerRef::new("Users", "Test"), &json!({"id": "x"}))
            .await
            .is_err());
        mock.assert_async().await;
    }
}
