//! 基础设施层
//!
//! 持有外部资源（文档存储、密钥服务），只暴露能力，不认识导入流程

pub mod cosmos;
pub mod document_store;
pub mod key_service;
pub mod key_vault;
pub mod memory_store;

pub use cosmos::CosmosStore;
pub use document_store::{
    parse_documents, query_as, ContainerRef, DocumentFilter, DocumentStore, StoreRole, UpsertResponse,
};
pub use key_service::KeyService;
pub use key_vault::{KeyVaultClient, VaultKey};
pub use memory_store::{MemoryStore, StoreStats};
