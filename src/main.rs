use anyhow::Result;
use quiz_import::utils::logging;
use quiz_import::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env()?;

    // 解析导入范围 [courseName [testName]] 并运行
    quiz_import::run(std::env::args().skip(1), config).await?;

    Ok(())
}
