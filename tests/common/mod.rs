#![allow(dead_code)]

use async_trait::async_trait;
use quiz_import::error::KeyServiceError;
use quiz_import::infrastructure::ContainerRef;
use quiz_import::services::{FieldEncryptor, WriteMode};
use quiz_import::{
    ImportDataset, ImportItem, ImportPipeline, ImportScope, KeyService, MemoryStore,
    PipelineSettings, ScopedDataset, TextProtection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 可逆但不确定的"加密"：首字节为随机掩码，其余字节与掩码异或
///
/// 同一明文每次加密结果不同，比较只能在解密后进行
#[derive(Default)]
pub struct FakeKeyService {
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
}

#[async_trait]
impl KeyService for FakeKeyService {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        let mask = uuid::Uuid::new_v4().as_bytes()[0] | 1;
        let mut out = Vec::with_capacity(plaintext.len() + 1);
        out.push(mask);
        out.extend(plaintext.iter().map(|b| b ^ mask));
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KeyServiceError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        match ciphertext.split_first() {
            Some((mask, body)) => Ok(body.iter().map(|b| b ^ mask).collect()),
            None => Err(KeyServiceError::Rejected {
                status: 400,
                message: "empty ciphertext".to_string(),
            }),
        }
    }
}

pub fn tests_container() -> ContainerRef {
    ContainerRef::new("Users", "Test")
}

pub fn questions_container() -> ContainerRef {
    ContainerRef::new("Users", "Question")
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        database: "Users".to_string(),
        test_container: "Test".to_string(),
        question_container: "Question".to_string(),
        test_write_mode: WriteMode::Parallel,
        question_write_mode: WriteMode::Serialized {
            delay: Duration::from_millis(1),
        },
        verbose_logging: true,
    }
}

/// 查询走只读句柄，写入走读写句柄
pub fn plaintext_pipeline(store: &MemoryStore) -> ImportPipeline {
    ImportPipeline::new(
        Arc::new(store.read_only()),
        Arc::new(store.clone()),
        TextProtection::Plaintext,
        settings(),
    )
    .expect("流水线构建失败")
}

pub fn encrypted_pipeline(store: &MemoryStore, key: Arc<FakeKeyService>) -> ImportPipeline {
    ImportPipeline::new(
        Arc::new(store.read_only()),
        Arc::new(store.clone()),
        TextProtection::Encrypted(FieldEncryptor::new(key, 4)),
        settings(),
    )
    .expect("流水线构建失败")
}

pub fn item(number: u32, choices: &[&str]) -> ImportItem {
    ImportItem {
        number,
        subjects: vec![format!("Question {}?", number)],
        choices: choices.iter().map(|c| c.to_string()).collect(),
        correct_idxes: vec![0],
        explanations: Some(vec![format!("Explanation {}", number)]),
        incorrect_choices_explanations: Some(
            std::iter::once(None)
                .chain(
                    choices
                        .iter()
                        .skip(1)
                        .map(|c| Some(vec![format!("{} is wrong", c)])),
                )
                .collect(),
        ),
        indicate_img_idxes: None,
        escape_translated_idxes: None,
        references: Some(vec!["https://learn.example.com".to_string()]),
    }
}

/// AZ-900 两个测试，AI-900 一个测试
pub fn sample_dataset() -> ImportDataset {
    let mut dataset = ImportDataset::new();
    dataset.insert_test(
        "AZ-900",
        "Practice 1",
        vec![item(1, &["a", "b"]), item(2, &["a", "b", "c"]), item(3, &["x", "y"])],
    );
    dataset.insert_test("AZ-900", "Practice 2", vec![item(1, &["a", "b"])]);
    dataset.insert_test("AI-900", "Practice 1", vec![item(1, &["a", "b"]), item(2, &["c", "d"])]);
    dataset
}

pub fn scoped(dataset: ImportDataset, scope: ImportScope) -> ScopedDataset {
    dataset.restrict(scope).expect("scope should exist in dataset")
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}
