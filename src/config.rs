use crate::error::{AppResult, ConfigError};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Cosmos DB 模拟器公开的固定主密钥
pub const EMULATOR_MASTER_KEY: &str =
    "C2y6yDjf5/R+ob0N8A7Cgv30VRDJIWEHLM+4QDU5DE2nQ9nDuVTqobD4b8mGGyPMbIZnqyMsEcaGQy67XIw/Jw==";

/// 部署环境
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deployment {
    /// 本地模拟器，明文存储
    Local,
    /// 云端，字段加密存储
    Cloud,
}

impl FromStr for Deployment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Deployment::Local),
            "cloud" => Ok(Deployment::Cloud),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Local => write!(f, "local"),
            Deployment::Cloud => write!(f, "cloud"),
        }
    }
}

/// 题目文本字段的存储方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncryptionMode {
    /// 明文字符串
    Plaintext,
    /// 逐字符串加密后的字节数组
    Encrypted,
}

impl FromStr for EncryptionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plaintext" => Ok(EncryptionMode::Plaintext),
            "encrypted" => Ok(EncryptionMode::Encrypted),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMode::Plaintext => write!(f, "plaintext"),
            EncryptionMode::Encrypted => write!(f, "encrypted"),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 部署环境
    pub deployment: Deployment,
    /// 文本字段存储方式
    pub encryption_mode: EncryptionMode,
    /// 导入数据（文件或目录）
    pub import_data_path: String,
    // --- 文档存储配置 ---
    pub database_name: String,
    pub test_container: String,
    pub question_container: String,
    pub cosmos_endpoint: Option<String>,
    /// 读写主密钥（未设置时：本地用模拟器密钥，云端从 Key Vault 取）
    pub cosmos_key: Option<String>,
    /// 只读主密钥
    pub cosmos_readonly_key: Option<String>,
    /// 本地模拟器使用自签名证书
    pub accept_invalid_certs: bool,
    // --- Key Vault 配置 ---
    pub vault_url: Option<String>,
    pub vault_token: Option<String>,
    pub crypto_key_name: String,
    pub cosmos_key_secret_name: String,
    pub cosmos_readonly_key_secret_name: String,
    // --- 节流与并发 ---
    /// 串行写入 Question 时两次请求之间的间隔
    pub question_write_delay_ms: u64,
    /// 同时加解密的题目数量
    pub max_concurrent_crypto: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_deployment(Deployment::Local)
    }
}

impl Config {
    /// 指定部署环境的默认配置
    pub fn for_deployment(deployment: Deployment) -> Self {
        let (encryption_mode, cosmos_endpoint, question_write_delay_ms) = match deployment {
            Deployment::Local => (
                EncryptionMode::Plaintext,
                Some("https://localhost:8081".to_string()),
                1000,
            ),
            Deployment::Cloud => (EncryptionMode::Encrypted, None, 3000),
        };

        Self {
            deployment,
            encryption_mode,
            import_data_path: "data/import.json".to_string(),
            database_name: "Users".to_string(),
            test_container: "Test".to_string(),
            question_container: "Question".to_string(),
            cosmos_endpoint,
            cosmos_key: None,
            cosmos_readonly_key: None,
            accept_invalid_certs: deployment == Deployment::Local,
            vault_url: None,
            vault_token: None,
            crypto_key_name: "manual-import-data".to_string(),
            cosmos_key_secret_name: "cosmos-db-primary-key".to_string(),
            cosmos_readonly_key_secret_name: "cosmos-db-primary-readonly-key".to_string(),
            question_write_delay_ms,
            max_concurrent_crypto: 8,
            verbose_logging: false,
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源读取配置，未设置的项使用部署环境默认值
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let deployment = parse_var(&lookup, "QA_DEPLOYMENT", "local|cloud")?
            .unwrap_or(Deployment::Local);
        let default = Self::for_deployment(deployment);

        Ok(Self {
            deployment,
            encryption_mode: parse_var(&lookup, "QA_ENCRYPTION_MODE", "plaintext|encrypted")?
                .unwrap_or(default.encryption_mode),
            import_data_path: lookup("IMPORT_DATA_PATH").unwrap_or(default.import_data_path),
            database_name: lookup("COSMOSDB_DATABASE").unwrap_or(default.database_name),
            test_container: default.test_container,
            question_container: default.question_container,
            cosmos_endpoint: lookup("COSMOSDB_URI").or(default.cosmos_endpoint),
            cosmos_key: lookup("COSMOSDB_KEY"),
            cosmos_readonly_key: lookup("COSMOSDB_READONLY_KEY"),
            accept_invalid_certs: default.accept_invalid_certs,
            vault_url: lookup("KEY_VAULT_URL"),
            vault_token: lookup("KEY_VAULT_TOKEN"),
            crypto_key_name: lookup("VAULT_CRYPTOGRAPHY_KEY_NAME")
                .unwrap_or(default.crypto_key_name),
            cosmos_key_secret_name: default.cosmos_key_secret_name,
            cosmos_readonly_key_secret_name: default.cosmos_readonly_key_secret_name,
            question_write_delay_ms: parse_var(&lookup, "QUESTION_WRITE_DELAY_MS", "u64")?
                .unwrap_or(default.question_write_delay_ms),
            max_concurrent_crypto: parse_var(&lookup, "MAX_CONCURRENT_CRYPTO", "usize")?
                .unwrap_or(default.max_concurrent_crypto)
                .max(1),
            verbose_logging: parse_var(&lookup, "VERBOSE_LOGGING", "bool")?
                .unwrap_or(default.verbose_logging),
        })
    }

    pub fn question_write_delay(&self) -> Duration {
        Duration::from_millis(self.question_write_delay_ms)
    }

    /// 文档存储端点，云端必须显式配置
    pub fn require_cosmos_endpoint(&self) -> AppResult<&str> {
        require(self.cosmos_endpoint.as_deref(), "COSMOSDB_URI")
    }

    pub fn require_vault_url(&self) -> AppResult<&str> {
        require(self.vault_url.as_deref(), "KEY_VAULT_URL")
    }

    pub fn require_vault_token(&self) -> AppResult<&str> {
        require(self.vault_token.as_deref(), "KEY_VAULT_TOKEN")
    }
}

fn require<'a>(value: Option<&'a str>, var_name: &str) -> AppResult<&'a str> {
    value.ok_or_else(|| {
        ConfigError::EnvVarNotFound {
            var_name: var_name.to_string(),
        }
        .into()
    })
}

fn parse_var<T, F>(lookup: &F, var_name: &str, expected_type: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        None => Ok(None),
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_local_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.deployment, Deployment::Local);
        assert_eq!(config.encryption_mode, EncryptionMode::Plaintext);
        assert_eq!(config.question_write_delay_ms, 1000);
        assert!(config.accept_invalid_certs);
        assert_eq!(config.require_cosmos_endpoint().unwrap(), "https://localhost:8081");
    }

    #[test]
    fn test_cloud_defaults_to_encrypted() {
        let config = Config::from_lookup(lookup_from(&[("QA_DEPLOYMENT", "cloud")])).unwrap();
        assert_eq!(config.encryption_mode, EncryptionMode::Encrypted);
        assert_eq!(config.question_write_delay(), Duration::from_secs(3));
        assert!(!config.accept_invalid_certs);

        // 云端没有默认端点
        let err = config.require_cosmos_endpoint().unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::EnvVarNotFound { ref var_name }) if var_name == "COSMOSDB_URI"
        ));
    }

    #[test]
    fn test_explicit_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("QA_DEPLOYMENT", "cloud"),
            ("QA_ENCRYPTION_MODE", "plaintext"),
            ("QUESTION_WRITE_DELAY_MS", "250"),
            ("MAX_CONCURRENT_CRYPTO", "0"),
        ]))
        .unwrap();
        assert_eq!(config.encryption_mode, EncryptionMode::Plaintext);
        assert_eq!(config.question_write_delay_ms, 250);
        // 并发数至少为 1
        assert_eq!(config.max_concurrent_crypto, 1);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = Config::from_lookup(lookup_from(&[("QUESTION_WRITE_DELAY_MS", "soon")]))
            .unwrap_err();
        match err {
            AppError::Config(ConfigError::EnvVarParseFailed { var_name, value, .. }) => {
                assert_eq!(var_name, "QUESTION_WRITE_DELAY_MS");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
