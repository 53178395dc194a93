//! 单个测试的导入计划 - 流程层
//!
//! 把"一个测试"需要的决定集中在一起：用哪个 id、Test 记录怎么写、
//! 哪些题目需要写、写成什么记录

use crate::error::AppResult;
use crate::models::{ImportDataset, ImportItem, PlainQuestion, QuestionRecord, TestCatalog, TestRecord};
use crate::services::{assign_test_id, diff_items, question_id, reconcile_test, PersistedQuestions, TestChange};
use crate::workflow::test_ctx::TestCtx;
use tracing::debug;

/// 单个测试的导入计划
#[derive(Debug, Clone)]
pub struct TestPlan<'a> {
    pub ctx: TestCtx,
    /// 写入后的 Test 记录
    pub record: TestRecord,
    pub change: TestChange,
    /// 数据集中该测试的全部题目
    pub items: &'a [ImportItem],
}

impl<'a> TestPlan<'a> {
    /// 与已存储题目比较，返回需要写入的题目
    pub fn changed_items(&self, persisted: &PersistedQuestions) -> Vec<&'a ImportItem> {
        let changed = diff_items(&self.ctx.test_id, self.items, persisted);
        debug!(
            "{} {} 道题目中 {} 道需要写入",
            self.ctx,
            self.items.len(),
            changed.len()
        );
        changed
    }

    /// 为题目分配 id，生成待写入的 Question 记录
    pub fn question_records(&self, items: &[&ImportItem]) -> Vec<PlainQuestion> {
        items
            .iter()
            .map(|item| QuestionRecord {
                id: question_id(&self.ctx.test_id, item.number),
                test_id: self.ctx.test_id.clone(),
                content: (*item).clone(),
            })
            .collect()
    }
}

/// 为数据集中的每个测试分配 id 并确定 Test 记录的变更
///
/// 同名 Test 在存储中不唯一时立即失败
pub fn plan_tests<'a>(dataset: &'a ImportDataset, catalog: &TestCatalog) -> AppResult<Vec<TestPlan<'a>>> {
    let mut plans = Vec::with_capacity(dataset.test_count());

    for (idx, entry) in dataset.tests().enumerate() {
        let existing = catalog.find(entry.course_name, entry.test_name)?;
        let test_id = assign_test_id(catalog, entry.course_name, entry.test_name)?;
        let (record, change) = reconcile_test(
            existing,
            &test_id,
            entry.course_name,
            entry.test_name,
            entry.items.len(),
        );

        plans.push(TestPlan {
            ctx: TestCtx::new(entry.course_name, entry.test_name, test_id, idx + 1),
            record,
            change,
            items: entry.items,
        });
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, ReconcileError};

    fn item(number: u32) -> ImportItem {
        ImportItem {
            number,
            subjects: vec!["s".to_string()],
            choices: vec!["a".to_string(), "b".to_string()],
            correct_idxes: vec![1],
            explanations: None,
            incorrect_choices_explanations: None,
            indicate_img_idxes: None,
            escape_translated_idxes: None,
            references: None,
        }
    }

    fn dataset() -> ImportDataset {
        let mut dataset = ImportDataset::new();
        dataset.insert_test("A", "new", vec![item(1)]);
        dataset.insert_test("A", "same", vec![item(1), item(2)]);
        dataset.insert_test("A", "grown", vec![item(1), item(2), item(3)]);
        dataset
    }

    #[test]
    fn test_plan_tests() {
        let dataset = dataset();
        let catalog = TestCatalog::new(vec![
            TestRecord::new("id-same", "A", "same", 2),
            TestRecord::new("id-grown", "A", "grown", 2),
        ]);

        let plans = plan_tests(&dataset, &catalog).unwrap();
        let changes: Vec<_> = plans
            .iter()
            .map(|p| (p.ctx.test_name.as_str(), p.change))
            .collect();
        assert_eq!(
            changes,
            vec![
                ("grown", TestChange::UpdateLength { from: 2, to: 3 }),
                ("new", TestChange::Create),
                ("same", TestChange::Unchanged),
            ]
        );
        assert_eq!(plans[0].ctx.test_id, "id-grown");
        assert_eq!(plans[2].record.id, "id-same");
    }

    #[test]
    fn test_question_records_use_composite_ids() {
        let dataset = dataset();
        let catalog = TestCatalog::new(vec![TestRecord::new("id-same", "A", "same", 2)]);
        let plans = plan_tests(&dataset, &catalog).unwrap();
        let same = plans.iter().find(|p| p.ctx.test_name == "same").unwrap();

        let changed = same.changed_items(&PersistedQuestions::new());
        let records = same.question_records(&changed);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["id-same_1", "id-same_2"]);
        assert!(records.iter().all(|r| r.test_id == "id-same"));
    }

    #[test]
    fn test_not_unique_test_fails_planning() {
        let dataset = dataset();
        let catalog = TestCatalog::new(vec![
            TestRecord::new("x", "A", "same", 2),
            TestRecord::new("y", "A", "same", 2),
        ]);
        let err = plan_tests(&dataset, &catalog).unwrap_err();
        assert!(matches!(
            err,
            AppError::Reconcile(ReconcileError::NotUniqueTest { .. })
        ));
    }
}
