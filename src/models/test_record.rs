use crate::error::{AppResult, ReconcileError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 持久化的 Test 记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: String,
    pub course_name: String,
    pub test_name: String,
    /// 题目数量
    pub length: usize,
    /// 其它已存储字段，更新时原样写回
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestRecord {
    pub fn new(
        id: impl Into<String>,
        course_name: impl Into<String>,
        test_name: impl Into<String>,
        length: usize,
    ) -> Self {
        Self {
            id: id.into(),
            course_name: course_name.into(),
            test_name: test_name.into(),
            length,
            extra: Map::new(),
        }
    }
}

/// 已存储 Test 的索引，按 (courseName, testName) 查找
#[derive(Debug, Default)]
pub struct TestCatalog {
    by_name: HashMap<(String, String), Vec<TestRecord>>,
}

impl TestCatalog {
    pub fn new(records: Vec<TestRecord>) -> Self {
        let mut by_name: HashMap<(String, String), Vec<TestRecord>> = HashMap::new();
        for record in records {
            by_name
                .entry((record.course_name.clone(), record.test_name.clone()))
                .or_default()
                .push(record);
        }
        Self { by_name }
    }

    /// 查找唯一匹配的 Test
    ///
    /// 同名 Test 多于一条属于数据一致性错误
    pub fn find(&self, course_name: &str, test_name: &str) -> AppResult<Option<&TestRecord>> {
        match self
            .by_name
            .get(&(course_name.to_string(), test_name.to_string()))
            .map(Vec::as_slice)
        {
            None | Some([]) => Ok(None),
            Some([record]) => Ok(Some(record)),
            Some(records) => Err(ReconcileError::NotUniqueTest {
                course_name: course_name.to_string(),
                test_name: test_name.to_string(),
                count: records.len(),
            }
            .into()),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
