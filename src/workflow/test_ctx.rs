//! 测试处理上下文
//!
//! 封装"我正在处理哪门课程的哪个测试"这一信息

use std::fmt::Display;

/// 测试处理上下文
#[derive(Debug, Clone)]
pub struct TestCtx {
    pub course_name: String,
    pub test_name: String,
    /// 分配到的 Test id
    pub test_id: String,
    /// 测试在本次运行中的序号（从1开始，仅用于日志显示）
    pub test_index: usize,
}

impl TestCtx {
    pub fn new(
        course_name: impl Into<String>,
        test_name: impl Into<String>,
        test_id: impl Into<String>,
        test_index: usize,
    ) -> Self {
        Self {
            course_name: course_name.into(),
            test_name: test_name.into(),
            test_id: test_id.into(),
            test_index,
        }
    }
}

impl Display for TestCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[测试#{} {} / {}]",
            self.test_index, self.course_name, self.test_name
        )
    }
}
