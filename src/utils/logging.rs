/// 日志工具模块
///
/// 提供日志初始化以及阶段、统计信息输出的辅助函数
use crate::config::Config;
use crate::orchestrator::{ImportReport, ImportStage};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 默认级别为 `info`，可通过 `RUST_LOG` 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, scope: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 题库导入启动");
    info!("🌐 部署环境: {}", config.deployment);
    info!("🔐 文本存储方式: {}", config.encryption_mode);
    info!("🎯 导入范围: {}", scope);
    info!("📁 数据来源: {}", config.import_data_path);
    info!("{}", "=".repeat(60));
}

/// 记录阶段切换
pub fn log_stage(stage: ImportStage) {
    info!("\n{}", "─".repeat(60));
    info!("▶ {}", stage);
}

/// 打印最终统计信息
pub fn print_final_stats(report: &ImportReport) {
    info!("\n{}", "=".repeat(60));
    info!("📊 导入完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "📝 Test: 新建 {}, 更新 {}, 未变化 {}",
        report.tests_created, report.tests_updated, report.tests_unchanged
    );
    info!(
        "📝 Question: 写入 {}, 未变化 {}",
        report.questions_written, report.questions_unchanged
    );
    if report.verify_mismatches > 0 {
        info!("⚠️ 校验不一致的 Test: {}", report.verify_mismatches);
    }
    info!("{}", "=".repeat(60));
}
