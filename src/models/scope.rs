//! 导入范围
//!
//! 命令行的位置参数在入口处一次性解析为 [`ImportScope`]，之后只传递这个值。

use crate::error::{AppError, AppResult};
use std::fmt;

/// 导入范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportScope {
    /// 全部课程
    All,
    /// 单个课程
    Course { course_name: String },
    /// 单个课程下的单个测试
    Test {
        course_name: String,
        test_name: String,
    },
}

impl ImportScope {
    /// 从位置参数解析（不含程序名）
    ///
    /// 允许 0、1（courseName）或 2（courseName testName）个参数
    pub fn from_args<I, S>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        match args.as_slice() {
            [] => Ok(ImportScope::All),
            [course_name] => Ok(ImportScope::Course {
                course_name: non_empty(course_name, "courseName")?,
            }),
            [course_name, test_name] => Ok(ImportScope::Test {
                course_name: non_empty(course_name, "courseName")?,
                test_name: non_empty(test_name, "testName")?,
            }),
            _ => Err(AppError::invalid_arguments(format!(
                "期望 0~2 个参数 ([courseName [testName]])，实际 {} 个",
                args.len()
            ))),
        }
    }
}

fn non_empty(value: &str, name: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_arguments(format!("{} 不能为空", name)));
    }
    Ok(trimmed.to_string())
}

impl fmt::Display for ImportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportScope::All => write!(f, "全部课程"),
            ImportScope::Course { course_name } => write!(f, "课程 {}", course_name),
            ImportScope::Test {
                course_name,
                test_name,
            } => write!(f, "课程 {} / 测试 {}", course_name, test_name),
        }
    }
}
