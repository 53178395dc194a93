//! 密钥服务 - 基础设施层
//!
//! 只暴露"用一把已解析的密钥加密/解密一段字节"的能力

use crate::error::KeyServiceError;
use async_trait::async_trait;

/// 单个密钥的加解密能力
///
/// 实例代表一把已经确认存在的密钥，每次调用处理一个字符串
#[async_trait]
pub trait KeyService: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyServiceError>;

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyServiceError>;
}
