//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 加载并裁剪数据集
//! - 建立存储客户端与加密器
//! - 输出最终统计
//!
//! ### `import_pipeline` - 导入流水线
//! - 按固定阶段顺序驱动各项能力
//! - 记录每个阶段，汇总导入统计
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! import_pipeline (处理整个数据集)
//!     ↓
//! workflow::TestPlan (处理单个测试)
//!     ↓
//! services (能力层：id / diff / 加解密 / 节流写入)
//!     ↓
//! infrastructure (基础设施：文档存储、密钥服务)
//! ```

pub mod app;
pub mod import_pipeline;

pub use app::{run, App};
pub use import_pipeline::{
    ImportPipeline, ImportReport, ImportStage, PipelineSettings, TextProtection,
};
