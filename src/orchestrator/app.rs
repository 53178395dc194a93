//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **加载数据**：读取并校验数据集，按导入范围裁剪
//! 2. **准备资源**：取主密钥、建立只读 / 读写两个存储客户端、解析加密密钥
//! 3. **运行**：交给 [`ImportPipeline`] 执行，输出最终统计
//!
//! 导入范围不合法时，在创建任何客户端之前就失败。

use crate::config::{Config, Deployment, EncryptionMode, EMULATOR_MASTER_KEY};
use crate::error::AppResult;
use crate::infrastructure::{CosmosStore, DocumentStore, KeyVaultClient, StoreRole};
use crate::models::{load_dataset, ImportScope, ScopedDataset};
use crate::orchestrator::import_pipeline::{
    ImportPipeline, ImportReport, ImportStage, PipelineSettings, TextProtection,
};
use crate::services::FieldEncryptor;
use crate::utils::logging::{log_stage, log_startup, print_final_stats};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 应用主结构
pub struct App {
    scoped: ScopedDataset,
    pipeline: ImportPipeline,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, scope: ImportScope) -> AppResult<Self> {
        log_startup(&config, &scope.to_string());

        log_stage(ImportStage::LoadDataset);
        let dataset = load_dataset(Path::new(&config.import_data_path)).await?;
        let scoped = dataset.restrict(scope)?;
        info!(
            "🎯 本次导入: {} 个测试, {} 道题目",
            scoped.dataset.test_count(),
            scoped.dataset.item_count()
        );

        let pipeline = build_pipeline(&config).await?;
        Ok(Self::with_pipeline(scoped, pipeline))
    }

    /// 使用已准备好的流水线
    pub fn with_pipeline(scoped: ScopedDataset, pipeline: ImportPipeline) -> Self {
        Self { scoped, pipeline }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<ImportReport> {
        let report = self.pipeline.run(&self.scoped).await?;
        print_final_stats(&report);
        Ok(report)
    }
}

/// 命令行入口：解析导入范围后初始化并运行
///
/// 参数为 `[courseName [testName]]`，参数不合法时不会访问任何外部服务
pub async fn run<I, S>(args: I, config: Config) -> AppResult<ImportReport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let scope = ImportScope::from_args(args)?;
    App::initialize(config, scope).await?.run().await
}

/// 按配置创建存储客户端与加密器
async fn build_pipeline(config: &Config) -> AppResult<ImportPipeline> {
    let write_key = store_key(
        config,
        config.cosmos_key.as_deref(),
        &config.cosmos_key_secret_name,
    )
    .await?;
    let read_key = store_key(
        config,
        config.cosmos_readonly_key.as_deref(),
        &config.cosmos_readonly_key_secret_name,
    )
    .await?;

    let endpoint = config.require_cosmos_endpoint()?;
    let reader: Arc<dyn DocumentStore> = Arc::new(CosmosStore::new(
        endpoint,
        &read_key,
        StoreRole::ReadOnly,
        config.accept_invalid_certs,
    )?);
    let writer: Arc<dyn DocumentStore> = Arc::new(CosmosStore::new(
        endpoint,
        &write_key,
        StoreRole::ReadWrite,
        config.accept_invalid_certs,
    )?);

    let protection = match config.encryption_mode {
        EncryptionMode::Plaintext => TextProtection::Plaintext,
        EncryptionMode::Encrypted => {
            let key = vault_client(config)?
                .resolve_key(&config.crypto_key_name)
                .await?;
            TextProtection::Encrypted(FieldEncryptor::new(
                Arc::new(key),
                config.max_concurrent_crypto,
            ))
        }
    };

    ImportPipeline::new(
        reader,
        writer,
        protection,
        PipelineSettings::from_config(config),
    )
}

fn vault_client(config: &Config) -> AppResult<KeyVaultClient> {
    Ok(KeyVaultClient::new(
        config.require_vault_url()?,
        config.require_vault_token()?,
    ))
}

/// 文档存储主密钥：显式配置 > 本地模拟器密钥 > Key Vault 机密
async fn store_key(config: &Config, explicit: Option<&str>, secret_name: &str) -> AppResult<String> {
    if let Some(key) = explicit {
        return Ok(key.to_string());
    }
    match config.deployment {
        Deployment::Local => Ok(EMULATOR_MASTER_KEY.to_string()),
        Deployment::Cloud => vault_client(config)?.get_secret(secret_name).await,
    }
}
