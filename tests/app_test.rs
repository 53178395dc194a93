use mockito::{Matcher, Server};
use quiz_import::error::{ConfigError, FileError};
use quiz_import::{App, AppError, Config, Deployment, ImportScope};
use tempfile::TempDir;

const DATASET: &str = r#"{
    "AZ-900": {
        "Practice 1": [
            {"number": 1, "subjects": ["s"], "choices": ["a", "b"], "correctIdxes": [0]}
        ]
    }
}"#;

fn config_with(dir: &TempDir, endpoint: &str) -> Config {
    let path = dir.path().join("import.json");
    std::fs::write(&path, DATASET).unwrap();
    let mut config = Config::default();
    config.import_data_path = path.display().to_string();
    config.cosmos_endpoint = Some(endpoint.to_string());
    config
}

#[tokio::test]
async fn test_unknown_course_fails_before_any_request() {
    let mut server = Server::new_async().await;
    let any = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();

    let result = App::initialize(
        config_with(&dir, &server.url()),
        ImportScope::Course {
            course_name: "DP-900".to_string(),
        },
    )
    .await;

    assert!(matches!(
        result.err(),
        Some(AppError::Config(ConfigError::InvalidArguments { .. }))
    ));
    any.assert_async().await;
}

#[tokio::test]
async fn test_three_arguments_fail_before_any_request() {
    let mut server = Server::new_async().await;
    let post = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let get = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let dir = TempDir::new().unwrap();

    let result = quiz_import::run(
        ["AZ-900", "Practice 1", "extra"],
        config_with(&dir, &server.url()),
    )
    .await;

    assert!(matches!(
        result.err(),
        Some(AppError::Config(ConfigError::InvalidArguments { .. }))
    ));
    post.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn test_missing_dataset_is_file_error() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.import_data_path = dir.path().join("missing.json").display().to_string();

    let result = App::initialize(config, ImportScope::All).await;
    assert!(matches!(
        result.err(),
        Some(AppError::File(FileError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_cloud_without_vault_is_config_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_with(&dir, "https://example.documents.azure.com");
    config.deployment = Deployment::Cloud;

    let result = App::initialize(config, ImportScope::All).await;
    assert!(matches!(
        result.err(),
        Some(AppError::Config(ConfigError::EnvVarNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_local_import_against_store_endpoint() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();

    let create_db = server
        .mock("POST", "/dbs")
        .with_status(409)
        .create_async()
        .await;
    let create_colls = server
        .mock("POST", "/dbs/Users/colls")
        .with_status(201)
        .expect(2)
        .create_async()
        .await;
    // 两个容器的查询都为空
    server
        .mock("POST", Matcher::Regex(r"^/dbs/Users/colls/\w+/docs$".to_string()))
        .match_header("x-ms-documentdb-isquery", "True")
        .with_status(200)
        .with_body(r#"{"Documents":[]}"#)
        .create_async()
        .await;
    let upserts = server
        .mock("POST", Matcher::Regex(r"^/dbs/Users/colls/\w+/docs$".to_string()))
        .match_header("x-ms-documentdb-is-upsert", "True")
        .with_status(201)
        .expect(2)
        .create_async()
        .await;

    let mut config = config_with(&dir, &server.url());
    config.question_write_delay_ms = 0;

    let app = tokio_test::assert_ok!(App::initialize(config, ImportScope::All).await);
    let report = tokio_test::assert_ok!(app.run().await);

    assert_eq!(report.tests_created, 1);
    assert_eq!(report.questions_written, 1);
    create_db.assert_async().await;
    create_colls.assert_async().await;
    upserts.assert_async().await;
}

#[tokio::test]
#[ignore] // 需要本地 Cosmos DB 模拟器：cargo test -- --ignored
async fn test_import_against_local_emulator() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = Config::from_env().expect("配置加载失败");
    let report = App::initialize(config, ImportScope::All)
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("导入失败");

    // 紧接着再导入一次应该没有任何写入
    let config = Config::from_env().expect("配置加载失败");
    let again = App::initialize(config, ImportScope::All)
        .await
        .expect("初始化失败")
        .run()
        .await
        .expect("导入失败");

    assert!(report.stages.len() > 1);
    assert_eq!(again.questions_written, 0);
    assert_eq!(again.tests_written(), 0);
}
