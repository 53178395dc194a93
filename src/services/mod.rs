//! 业务能力层
//!
//! 每个服务只描述"我能做什么"，不关心流程顺序

pub mod differ;
pub mod field_encryptor;
pub mod id_assigner;
pub mod throttled_writer;

pub use differ::{diff_items, index_persisted, reconcile_test, PersistedQuestions, TestChange};
pub use field_encryptor::FieldEncryptor;
pub use id_assigner::{assign_test_id, question_id};
pub use throttled_writer::{ThrottledWriter, WriteMode, WriteSummary};
