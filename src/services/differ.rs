//! 对账比较 - 业务能力层
//!
//! 只回答"哪些需要写"，不负责写入

use crate::models::{ImportItem, PlainQuestion, TestRecord};
use crate::services::id_assigner::question_id;
use std::collections::HashMap;

/// Test 记录需要的变更
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestChange {
    /// 首次出现
    Create,
    /// 题目数量变化
    UpdateLength { from: usize, to: usize },
    /// 无变化
    Unchanged,
}

impl TestChange {
    pub fn needs_write(&self) -> bool {
        !matches!(self, TestChange::Unchanged)
    }
}

/// 计算 Test 记录的目标状态
///
/// 只有 `length` 可变；已存在的记录原样带入（包括 id 和其它字段），
/// 用于完整记录的 upsert
pub fn reconcile_test(
    existing: Option<&TestRecord>,
    test_id: &str,
    course_name: &str,
    test_name: &str,
    length: usize,
) -> (TestRecord, TestChange) {
    match existing {
        None => (
            TestRecord::new(test_id, course_name, test_name, length),
            TestChange::Create,
        ),
        Some(record) if record.length != length => {
            let mut updated = record.clone();
            updated.length = length;
            (
                updated,
                TestChange::UpdateLength {
                    from: record.length,
                    to: length,
                },
            )
        }
        Some(record) => (record.clone(), TestChange::Unchanged),
    }
}

/// 已存储（已解密）的题目，按 id 索引
pub type PersistedQuestions = HashMap<String, PlainQuestion>;

pub fn index_persisted(questions: Vec<PlainQuestion>) -> PersistedQuestions {
    questions
        .into_iter()
        .map(|question| (question.id.clone(), question))
        .collect()
}

/// 找出需要写入的题目
///
/// 没有同 id 的已存储题目，或内容不完全相同（深比较）的题目会被选中，
/// 顺序与输入一致
pub fn diff_items<'a>(
    test_id: &str,
    incoming: &'a [ImportItem],
    persisted: &PersistedQuestions,
) -> Vec<&'a ImportItem> {
    incoming
        .iter()
        .filter(|item| {
            let id = question_id(test_id, item.number);
            match persisted.get(&id) {
                Some(existing) => existing.test_id != test_id || existing.content != **item,
                None => true,
            }
        })
        .collect()
}
