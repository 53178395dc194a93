//! # Quiz Import
//!
//! 把题库导入数据同步到文档存储：分配 id、比较差异、按需加密、节流写入
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `DocumentStore` - 建库建表 / 查询 / upsert（Cosmos REST 客户端、内存实现）
//! - `KeyService` - 单个字符串的加解密（Key Vault REST 客户端）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `id_assigner` - Test / Question 的 id
//! - `differ` - 找出需要写入的记录
//! - `FieldEncryptor` - 文本字段加解密
//! - `ThrottledWriter` - 并发或串行节流写入
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个测试"的导入计划
//! - `TestCtx` - 上下文封装（课程 + 测试 + id）
//! - `TestPlan` - Test 记录变更与待写入题目
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/import_pipeline` - 固定阶段顺序的导入流水线
//! - `orchestrator/app` - 加载数据集、准备资源、运行
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Deployment, EncryptionMode};
pub use error::{AppError, AppResult};
pub use infrastructure::{DocumentStore, KeyService, MemoryStore};
pub use models::{ImportDataset, ImportItem, ImportScope, ScopedDataset};
pub use orchestrator::{run, App, ImportPipeline, ImportReport, ImportStage, PipelineSettings, TextProtection};
pub use workflow::{TestCtx, TestPlan};
