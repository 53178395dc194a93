//! 标识符分配 - 业务能力层

use crate::error::AppResult;
use crate::models::TestCatalog;
use uuid::Uuid;

/// 为测试分配 id
///
/// 已存在同名 Test 时沿用其 id，否则生成新的随机 UUID。
/// 同名 Test 多于一条时返回 Not Unique Test 错误。
pub fn assign_test_id(catalog: &TestCatalog, course_name: &str, test_name: &str) -> AppResult<String> {
    Ok(match catalog.find(course_name, test_name)? {
        Some(existing) => existing.id.clone(),
        None => Uuid::new_v4().to_string(),
    })
}

/// 题目 id：`${testId}_${number}`
pub fn question_id(test_id: &str, number: u32) -> String {
    format!("{}_{}", test_id, number)
}
