//! Key Vault REST 客户端 - 基础设施层
//!
//! 取机密（云端文档存储的主密钥）、解析加密密钥、逐字符串 RSA 加解密

use crate::error::{AppError, AppResult, ConfigError, KeyServiceError};
use crate::infrastructure::key_service::KeyService;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

const API_VERSION: &str = "7.4";

/// 固定的非对称加密算法
pub const KEY_ALGORITHM: &str = "RSA1_5";

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

#[derive(Debug, Deserialize)]
struct KeyBundle {
    key: JsonWebKey,
}

#[derive(Debug, Deserialize)]
struct JsonWebKey {
    kid: String,
}

#[derive(Debug, Deserialize)]
struct KeyOperationResult {
    value: String,
}

/// Key Vault 客户端
pub struct KeyVaultClient {
    client: reqwest::Client,
    vault_url: String,
    token: String,
}

impl KeyVaultClient {
    pub fn new(vault_url: &str, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            vault_url: vault_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// 读取机密的值
    pub async fn get_secret(&self, name: &str) -> AppResult<String> {
        let response = self
            .client
            .get(format!("{}/secrets/{}", self.vault_url, name))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(KeyServiceError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConfigError::SecretNotFound {
                name: name.to_string(),
            }
            .into());
        }
        let bundle: SecretBundle = parse(response).await?;

        debug!("🔑 已读取机密 {}", name);
        Ok(bundle.value)
    }

    /// 解析加密密钥
    ///
    /// 密钥不存在时返回配置错误，此时尚未发生任何加解密调用
    pub async fn resolve_key(&self, name: &str) -> AppResult<VaultKey> {
        let response = self
            .client
            .get(format!("{}/keys/{}", self.vault_url, name))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(KeyServiceError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConfigError::KeyNotFound {
                name: name.to_string(),
            }
            .into());
        }
        let bundle: KeyBundle = parse(response).await?;

        info!("🔑 已解析加密密钥 {}", name);
        Ok(VaultKey {
            client: self.client.clone(),
            kid: bundle.key.kid,
            token: self.token.clone(),
        })
    }
}

/// Key Vault 中的一把密钥
pub struct VaultKey {
    client: reqwest::Client,
    kid: String,
    token: String,
}

impl VaultKey {
    /// 密钥标识（带版本的 URL）
    pub fn kid(&self) -> &str {
        &self.kid
    }

    async fn operate(&self, operation: &str, input: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        let response = self
            .client
            .post(format!("{}/{}", self.kid, operation))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&self.token)
            .json(&json!({
                "alg": KEY_ALGORITHM,
                "value": URL_SAFE_NO_PAD.encode(input),
            }))
            .send()
            .await?;

        let result: KeyOperationResult = parse_raw(response).await?;
        Ok(URL_SAFE_NO_PAD.decode(result.value.trim_end_matches('='))?)
    }
}

#[async_trait]
impl KeyService for VaultKey {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        self.operate("encrypt", plaintext).await
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        self.operate("decrypt", ciphertext).await
    }
}

async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> AppResult<T> {
    parse_raw(response).await.map_err(AppError::from)
}

async fn parse_raw<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, KeyServiceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(KeyServiceError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}
