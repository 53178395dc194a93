use crate::error::{AppError, AppResult, FileError};
use crate::models::dataset::ImportDataset;
use crate::models::question::ImportItem;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 单个测试文件的 TOML 结构（`[[items]]`）
#[derive(Debug, Deserialize)]
struct TomlTestFile {
    #[serde(default)]
    items: Vec<ImportItem>,
}

/// 加载导入数据集
///
/// - 文件：整个数据集的嵌套 JSON `{course: {test: [items]}}`
/// - 目录：`<root>/<courseName>/<testName>.json|.toml`，每个文件一个测试
///
/// 任何文件错误都会终止导入。题目内容的校验在按范围裁剪时进行，
/// 见 [`ImportDataset::restrict`]。
///
/// TOML 没有 null：`incorrectChoicesExplanations` 中正确选项的位置写成空数组 `[]`，
/// 加载时转换为 null。
pub async fn load_dataset(path: &Path) -> AppResult<ImportDataset> {
    let metadata = fs::metadata(path).await.map_err(|_| FileError::NotFound {
        path: path.display().to_string(),
    })?;

    let dataset = if metadata.is_dir() {
        load_dataset_dir(path).await?
    } else {
        load_dataset_file(path).await?
    };

    tracing::info!(
        "📦 数据集加载完成: {} 个课程, {} 个测试, {} 道题目",
        dataset.course_count(),
        dataset.test_count(),
        dataset.item_count()
    );

    Ok(dataset)
}

/// 从单个嵌套 JSON 文件加载
pub async fn load_dataset_file(path: &Path) -> AppResult<ImportDataset> {
    if extension(path) != Some("json") {
        return Err(FileError::UnsupportedFormat {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = read(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::file_parse_failed(path.display().to_string(), e))
}

/// 从按课程分目录的文件夹加载
pub async fn load_dataset_dir(root: &Path) -> AppResult<ImportDataset> {
    let mut dataset = ImportDataset::new();

    for course_dir in sorted_entries(root).await? {
        if !fs::metadata(&course_dir)
            .await
            .map_err(|e| AppError::file_read_failed(course_dir.display().to_string(), e))?
            .is_dir()
        {
            tracing::debug!("跳过非目录条目: {}", course_dir.display());
            continue;
        }
        let Some(course_name) = file_name(&course_dir) else {
            continue;
        };

        for test_file in sorted_entries(&course_dir).await? {
            let Some(test_name) = file_stem(&test_file) else {
                continue;
            };
            let items = match extension(&test_file) {
                Some("json") => load_json_test(&test_file).await?,
                Some("toml") => load_toml_test(&test_file).await?,
                _ => {
                    tracing::debug!("跳过非数据文件: {}", test_file.display());
                    continue;
                }
            };

            tracing::info!(
                "正在加载: {} / {} ({} 道题目)",
                course_name,
                test_name,
                items.len()
            );
            dataset.insert_test(course_name.clone(), test_name, items);
        }
    }

    Ok(dataset)
}

async fn load_json_test(path: &Path) -> AppResult<Vec<ImportItem>> {
    let content = read(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::file_parse_failed(path.display().to_string(), e))
}

async fn load_toml_test(path: &Path) -> AppResult<Vec<ImportItem>> {
    let content = read(path).await?;
    let file: TomlTestFile = toml::from_str(&content)
        .map_err(|e| AppError::file_parse_failed(path.display().to_string(), e))?;
    Ok(file.items.into_iter().map(empty_cells_to_null).collect())
}

/// TOML 中用空数组表示 null 单元
fn empty_cells_to_null(mut item: ImportItem) -> ImportItem {
    clear_empty(&mut item.incorrect_choices_explanations);
    if let Some(escape) = item.escape_translated_idxes.as_mut() {
        clear_empty(&mut escape.incorrect_choices_explanations);
    }
    item
}

fn clear_empty<T>(cells: &mut Option<Vec<Option<Vec<T>>>>) {
    for cell in cells.iter_mut().flatten() {
        if cell.as_ref().is_some_and(Vec::is_empty) {
            *cell = None;
        }
    }
}

async fn read(path: &Path) -> AppResult<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}

/// 目录条目按文件名排序，保证加载顺序稳定
async fn sorted_entries(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?
    {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
