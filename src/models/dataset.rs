use crate::error::{AppError, AppResult, DatasetError};
use crate::models::question::ImportItem;
use crate::models::scope::ImportScope;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 导入数据集：courseName → testName → 题目列表
///
/// 只在一次导入运行期间存在
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportDataset {
    courses: BTreeMap<String, BTreeMap<String, Vec<ImportItem>>>,
}

/// 一个测试及其题目
#[derive(Debug, Clone, Copy)]
pub struct TestEntry<'a> {
    pub course_name: &'a str,
    pub test_name: &'a str,
    pub items: &'a [ImportItem],
}

impl ImportDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加（或替换）一个测试的题目
    pub fn insert_test(
        &mut self,
        course_name: impl Into<String>,
        test_name: impl Into<String>,
        items: Vec<ImportItem>,
    ) {
        self.courses
            .entry(course_name.into())
            .or_default()
            .insert(test_name.into(), items);
    }

    /// 按课程名、测试名顺序遍历所有测试
    pub fn tests(&self) -> impl Iterator<Item = TestEntry<'_>> {
        self.courses.iter().flat_map(|(course_name, tests)| {
            tests.iter().map(move |(test_name, items)| TestEntry {
                course_name,
                test_name,
                items,
            })
        })
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }

    pub fn test_count(&self) -> usize {
        self.courses.values().map(BTreeMap::len).sum()
    }

    pub fn item_count(&self) -> usize {
        self.tests().map(|entry| entry.items.len()).sum()
    }

    /// 校验每道题目的索引与题号
    pub fn validate(&self) -> AppResult<()> {
        for entry in self.tests() {
            let mut seen = HashSet::new();
            for item in entry.items {
                validate_item(entry.course_name, entry.test_name, item)?;
                if !seen.insert(item.number) {
                    return Err(DatasetError::DuplicateNumber {
                        course_name: entry.course_name.to_string(),
                        test_name: entry.test_name.to_string(),
                        number: item.number,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// 按导入范围裁剪数据集，并校验裁剪后的题目
    ///
    /// 范围中的课程或测试不存在时返回 invalid arguments 错误；
    /// 范围外的题目不参与校验
    pub fn restrict(mut self, scope: ImportScope) -> AppResult<ScopedDataset> {
        match &scope {
            ImportScope::All => {}
            ImportScope::Course { course_name } => {
                let tests = self.courses.remove(course_name).ok_or_else(|| {
                    AppError::invalid_arguments(format!("课程不存在: {}", course_name))
                })?;
                self.courses = BTreeMap::from([(course_name.clone(), tests)]);
            }
            ImportScope::Test {
                course_name,
                test_name,
            } => {
                let items = self
                    .courses
                    .get_mut(course_name)
                    .and_then(|tests| tests.remove(test_name))
                    .ok_or_else(|| {
                        AppError::invalid_arguments(format!(
                            "测试不存在: {} / {}",
                            course_name, test_name
                        ))
                    })?;
                self.courses = BTreeMap::new();
                self.insert_test(course_name.clone(), test_name.clone(), items);
            }
        }

        self.validate()?;
        Ok(ScopedDataset {
            scope,
            dataset: self,
        })
    }
}

/// 已按范围裁剪的数据集，是导入流程唯一接受的输入
#[derive(Debug, Clone)]
pub struct ScopedDataset {
    pub scope: ImportScope,
    pub dataset: ImportDataset,
}

fn validate_item(course_name: &str, test_name: &str, item: &ImportItem) -> AppResult<()> {
    if item.number == 0 {
        return Err(DatasetError::ZeroNumber {
            course_name: course_name.to_string(),
            test_name: test_name.to_string(),
        }
        .into());
    }

    let check = |field: &str, indexes: &[usize], len: usize| -> AppResult<()> {
        match indexes.iter().find(|&&index| index >= len) {
            Some(&index) => Err(DatasetError::IndexOutOfRange {
                course_name: course_name.to_string(),
                test_name: test_name.to_string(),
                number: item.number,
                field: field.to_string(),
                index,
                len,
            }
            .into()),
            None => Ok(()),
        }
    };

    let explanations_len = item.explanations.as_ref().map_or(0, Vec::len);

    check("correctIdxes", &item.correct_idxes, item.choices.len())?;

    if let Some(ice) = &item.incorrect_choices_explanations {
        if ice.len() > item.choices.len() {
            return Err(DatasetError::IndexOutOfRange {
                course_name: course_name.to_string(),
                test_name: test_name.to_string(),
                number: item.number,
                field: "incorrectChoicesExplanations".to_string(),
                index: ice.len() - 1,
                len: item.choices.len(),
            }
            .into());
        }
    }

    if let Some(img) = &item.indicate_img_idxes {
        if let Some(indexes) = &img.subjects {
            check("indicateImgIdxes.subjects", indexes, item.subjects.len())?;
        }
        if let Some(indexes) = &img.explanations {
            check("indicateImgIdxes.explanations", indexes, explanations_len)?;
        }
    }

    if let Some(escape) = &item.escape_translated_idxes {
        if let Some(indexes) = &escape.subjects {
            check("escapeTranslatedIdxes.subjects", indexes, item.subjects.len())?;
        }
        if let Some(indexes) = &escape.choices {
            check("escapeTranslatedIdxes.choices", indexes, item.choices.len())?;
        }
        if let Some(indexes) = &escape.explanations {
            check("escapeTranslatedIdxes.explanations", indexes, explanations_len)?;
        }
        if let Some(per_choice) = &escape.incorrect_choices_explanations {
            let ice = item.incorrect_choices_explanations.as_deref().unwrap_or(&[]);
            for (choice_idx, indexes) in per_choice.iter().enumerate() {
                let Some(indexes) = indexes else { continue };
                let len = ice
                    .get(choice_idx)
                    .and_then(Option::as_ref)
                    .map_or(0, Vec::len);
                check(
                    &format!("escapeTranslatedIdxes.incorrectChoicesExplanations[{}]", choice_idx),
                    indexes,
                    len,
                )?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::models::question::EscapeTranslatedIdxes;

    fn item(number: u32) -> ImportItem {
        ImportItem {
            number,
            subjects: vec![format!("question {}", number)],
            choices: vec!["a".to_string(), "b".to_string()],
            correct_idxes: vec![0],
            explanations: Some(vec!["because".to_string()]),
            incorrect_choices_explanations: None,
            indicate_img_idxes: None,
            escape_translated_idxes: None,
            references: None,
        }
    }

    fn sample() -> ImportDataset {
        let mut dataset = ImportDataset::new();
        dataset.insert_test("A", "T1", vec![item(1), item(2)]);
        dataset.insert_test("A", "T2", vec![item(1)]);
        dataset.insert_test("B", "T1", vec![item(1)]);
        dataset
    }

    #[test]
    fn test_counts() {
        let dataset = sample();
        assert_eq!(dataset.course_count(), 2);
        assert_eq!(dataset.test_count(), 3);
        assert_eq!(dataset.item_count(), 4);
        assert!(dataset.validate().is_ok());
    }

    #[test]
    fn test_restrict_to_course_and_test() {
        let scoped = sample()
            .restrict(ImportScope::Course {
                course_name: "A".to_string(),
            })
            .unwrap();
        assert_eq!(scoped.dataset.test_count(), 2);

        let scoped = sample()
            .restrict(ImportScope::Test {
                course_name: "A".to_string(),
                test_name: "T2".to_string(),
            })
            .unwrap();
        let tests: Vec<_> = scoped.dataset.tests().collect();
        assert_eq!(tests.len(), 1);
        assert_eq!((tests[0].course_name, tests[0].test_name), ("A", "T2"));
    }

    #[test]
    fn test_restrict_unknown_name_is_invalid_arguments() {
        let err = sample()
            .restrict(ImportScope::Test {
                course_name: "B".to_string(),
                test_name: "T9".to_string(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_restrict_validates_only_the_scoped_tests() {
        let mut bad = item(1);
        bad.correct_idxes = vec![5];
        let mut dataset = sample();
        dataset.insert_test("B", "broken", vec![bad]);

        let scoped = dataset
            .clone()
            .restrict(ImportScope::Course {
                course_name: "A".to_string(),
            })
            .unwrap();
        assert_eq!(scoped.dataset.item_count(), 3);

        assert!(matches!(
            dataset.restrict(ImportScope::All).unwrap_err(),
            AppError::Dataset(DatasetError::IndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let mut dataset = ImportDataset::new();
        dataset.insert_test("A", "T1", vec![item(1), item(1)]);
        assert!(matches!(
            dataset.validate().unwrap_err(),
            AppError::Dataset(DatasetError::DuplicateNumber { number: 1, .. })
        ));
    }

    #[test]
    fn test_out_of_range_indexes_rejected() {
        let mut bad = item(1);
        bad.correct_idxes = vec![2];
        let mut dataset = ImportDataset::new();
        dataset.insert_test("A", "T1", vec![bad]);
        assert!(matches!(
            dataset.validate().unwrap_err(),
            AppError::Dataset(DatasetError::IndexOutOfRange { index: 2, len: 2, .. })
        ));

        let mut bad = item(1);
        bad.incorrect_choices_explanations = Some(vec![None, Some(vec!["x".to_string()])]);
        bad.escape_translated_idxes = Some(EscapeTranslatedIdxes {
            incorrect_choices_explanations: Some(vec![None, Some(vec![1])]),
            ..Default::default()
        });
        let mut dataset = ImportDataset::new();
        dataset.insert_test("A", "T1", vec![bad]);
        assert!(dataset.validate().is_err());
    }
}
