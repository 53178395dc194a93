//! 导入流水线 - 编排层
//!
//! ## 职责
//!
//! 按固定顺序驱动各项能力，把已裁剪的数据集同步到文档存储：
//!
//! ```text
//! EnsureSchema → AssignTestIds → WriteTests → FetchPersistedQuestions
//!     → DecryptPersisted → Diff → AssignQuestionIds → EncryptDiff
//!     → WriteQuestions → Verify → Done
//! ```
//!
//! 每个阶段只进入一次；任何错误立即终止，不重试，不回滚已完成的写入。
//! 查询只走只读客户端，写入只走读写客户端。

use crate::config::Config;
use crate::error::{AppResult, StoreError};
use crate::infrastructure::{
    parse_documents, query_as, ContainerRef, DocumentFilter, DocumentStore, StoreRole,
};
use crate::models::{
    EncryptedQuestion, ImportScope, PlainQuestion, ScopedDataset, TestCatalog, TestRecord,
};
use crate::services::{
    index_persisted, FieldEncryptor, TestChange, ThrottledWriter, WriteMode,
};
use crate::utils::logging::log_stage;
use crate::workflow::{plan_tests, TestPlan};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 导入阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImportStage {
    LoadDataset,
    EnsureSchema,
    AssignTestIds,
    WriteTests,
    FetchPersistedQuestions,
    DecryptPersisted,
    Diff,
    AssignQuestionIds,
    EncryptDiff,
    WriteQuestions,
    Verify,
    Done,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportStage::LoadDataset => "LoadDataset (加载数据集)",
            ImportStage::EnsureSchema => "EnsureSchema (确认数据库与容器)",
            ImportStage::AssignTestIds => "AssignTestIds (分配 Test id)",
            ImportStage::WriteTests => "WriteTests (写入 Test)",
            ImportStage::FetchPersistedQuestions => "FetchPersistedQuestions (读取已存储题目)",
            ImportStage::DecryptPersisted => "DecryptPersisted (解密已存储题目)",
            ImportStage::Diff => "Diff (比较差异)",
            ImportStage::AssignQuestionIds => "AssignQuestionIds (分配题目 id)",
            ImportStage::EncryptDiff => "EncryptDiff (加密待写入题目)",
            ImportStage::WriteQuestions => "WriteQuestions (写入题目)",
            ImportStage::Verify => "Verify (校验题目数量)",
            ImportStage::Done => "Done",
        };
        write!(f, "{}", label)
    }
}

/// 一次导入的统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub tests_created: usize,
    pub tests_updated: usize,
    pub tests_unchanged: usize,
    pub questions_written: usize,
    pub questions_unchanged: usize,
    /// 题目数量与 Test.length 不一致的测试数
    pub verify_mismatches: usize,
    /// 依次进入过的阶段
    pub stages: Vec<ImportStage>,
}

impl ImportReport {
    pub fn tests_written(&self) -> usize {
        self.tests_created + self.tests_updated
    }
}

/// 题目文本的保护方式
#[derive(Clone)]
pub enum TextProtection {
    Plaintext,
    Encrypted(FieldEncryptor),
}

/// 一批题目记录，明文或密文
enum QuestionBatch {
    Plain(Vec<PlainQuestion>),
    Encrypted(Vec<EncryptedQuestion>),
}

impl QuestionBatch {
    fn len(&self) -> usize {
        match self {
            QuestionBatch::Plain(records) => records.len(),
            QuestionBatch::Encrypted(records) => records.len(),
        }
    }
}

/// 流水线参数
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub database: String,
    pub test_container: String,
    pub question_container: String,
    pub test_write_mode: WriteMode,
    pub question_write_mode: WriteMode,
    pub verbose_logging: bool,
}

impl PipelineSettings {
    /// Test 并发写入，Question 按配置的间隔串行写入
    pub fn from_config(config: &Config) -> Self {
        Self {
            database: config.database_name.clone(),
            test_container: config.test_container.clone(),
            question_container: config.question_container.clone(),
            test_write_mode: WriteMode::Parallel,
            question_write_mode: WriteMode::Serialized {
                delay: config.question_write_delay(),
            },
            verbose_logging: config.verbose_logging,
        }
    }

    fn tests(&self) -> ContainerRef {
        ContainerRef::new(&self.database, &self.test_container)
    }

    fn questions(&self) -> ContainerRef {
        ContainerRef::new(&self.database, &self.question_container)
    }
}

/// 导入流水线
pub struct ImportPipeline {
    reader: Arc<dyn DocumentStore>,
    writer: Arc<dyn DocumentStore>,
    protection: TextProtection,
    settings: PipelineSettings,
}

impl ImportPipeline {
    /// # 参数
    /// - `reader`: 只用于查询的客户端
    /// - `writer`: 只用于建库建表和 upsert 的客户端
    ///
    /// `reader` 必须是只读角色，`writer` 必须是读写角色
    pub fn new(
        reader: Arc<dyn DocumentStore>,
        writer: Arc<dyn DocumentStore>,
        protection: TextProtection,
        settings: PipelineSettings,
    ) -> AppResult<Self> {
        expect_role("reader", reader.as_ref(), StoreRole::ReadOnly)?;
        expect_role("writer", writer.as_ref(), StoreRole::ReadWrite)?;
        Ok(Self {
            reader,
            writer,
            protection,
            settings,
        })
    }

    /// 运行一次导入
    pub async fn run(&self, scoped: &ScopedDataset) -> AppResult<ImportReport> {
        let mut report = ImportReport::default();
        match self.execute(scoped, &mut report).await {
            Ok(()) => Ok(report),
            Err(e) => {
                let stage = report
                    .stages
                    .last()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                error!("❌ 阶段 {} 失败: {}", stage, e);
                Err(e)
            }
        }
    }

    async fn execute(&self, scoped: &ScopedDataset, report: &mut ImportReport) -> AppResult<()> {
        let tests = self.settings.tests();
        let questions = self.settings.questions();
        let writer = ThrottledWriter::new(Arc::clone(&self.writer));

        // ========== EnsureSchema ==========
        enter(report, ImportStage::EnsureSchema);
        self.writer.ensure_database(&self.settings.database).await?;
        self.writer.ensure_container(&tests).await?;
        self.writer.ensure_container(&questions).await?;

        // ========== AssignTestIds ==========
        enter(report, ImportStage::AssignTestIds);
        let existing: Vec<TestRecord> =
            query_as(self.reader.as_ref(), &tests, &test_filter(&scoped.scope)).await?;
        info!("📚 已存储 Test: {} 条", existing.len());
        let catalog = TestCatalog::new(existing);
        if catalog.is_empty() {
            info!("📭 导入范围内尚无已存储的 Test，全部新建");
        }
        let plans = plan_tests(&scoped.dataset, &catalog)?;

        // ========== WriteTests ==========
        enter(report, ImportStage::WriteTests);
        let mut test_records = Vec::new();
        for plan in &plans {
            match plan.change {
                TestChange::Create => {
                    report.tests_created += 1;
                    info!("{} 🆕 新建 Test {}", plan.ctx, plan.ctx.test_id);
                }
                TestChange::UpdateLength { from, to } => {
                    report.tests_updated += 1;
                    info!("{} ✏️ 题目数量 {} → {}", plan.ctx, from, to);
                }
                TestChange::Unchanged => {
                    report.tests_unchanged += 1;
                    continue;
                }
            }
            test_records.push(plan.record.clone());
        }
        writer
            .write_batch(&tests, &test_records, self.settings.test_write_mode)
            .await?;

        // ========== FetchPersistedQuestions ==========
        enter(report, ImportStage::FetchPersistedQuestions);
        let documents = self.fetch_persisted(scoped, &plans, &questions).await?;
        info!("📥 已存储题目: {} 道", documents.len());

        // ========== DecryptPersisted ==========
        enter(report, ImportStage::DecryptPersisted);
        let persisted: Vec<PlainQuestion> = match &self.protection {
            TextProtection::Plaintext => parse_documents(&questions, documents)?,
            TextProtection::Encrypted(encryptor) => {
                let encrypted: Vec<EncryptedQuestion> = parse_documents(&questions, documents)?;
                encryptor.decrypt_records(&encrypted).await?
            }
        };
        let persisted = index_persisted(persisted);

        // ========== Diff ==========
        enter(report, ImportStage::Diff);
        let mut changed = Vec::with_capacity(plans.len());
        for plan in &plans {
            let items = plan.changed_items(&persisted);
            report.questions_unchanged += plan.items.len() - items.len();
            if self.settings.verbose_logging {
                for item in &items {
                    info!("{} 题目 #{} 需要写入", plan.ctx, item.number);
                }
            }
            changed.push(items);
        }

        // ========== AssignQuestionIds ==========
        enter(report, ImportStage::AssignQuestionIds);
        let records: Vec<PlainQuestion> = plans
            .iter()
            .zip(&changed)
            .flat_map(|(plan, items)| plan.question_records(items))
            .collect();
        info!("📝 需要写入的题目: {} 道", records.len());

        // ========== EncryptDiff ==========
        enter(report, ImportStage::EncryptDiff);
        let outgoing = match &self.protection {
            TextProtection::Plaintext => QuestionBatch::Plain(records),
            TextProtection::Encrypted(encryptor) => {
                QuestionBatch::Encrypted(encryptor.encrypt_records(&records).await?)
            }
        };

        // ========== WriteQuestions ==========
        enter(report, ImportStage::WriteQuestions);
        let mode = self.settings.question_write_mode;
        let summary = match &outgoing {
            QuestionBatch::Plain(records) => writer.write_batch(&questions, records, mode).await?,
            QuestionBatch::Encrypted(records) => {
                writer.write_batch(&questions, records, mode).await?
            }
        };
        report.questions_written = summary.written();
        debug!("写入 {} 道题目 (期望 {})", summary.written(), outgoing.len());

        // ========== Verify ==========
        enter(report, ImportStage::Verify);
        let touched: Vec<&TestPlan> = plans
            .iter()
            .zip(&changed)
            .filter(|(plan, items)| plan.change.needs_write() || !items.is_empty())
            .map(|(plan, _)| plan)
            .collect();
        report.verify_mismatches = self.verify(&touched, &questions).await?;

        enter(report, ImportStage::Done);
        Ok(())
    }

    /// 读取相关测试的已存储题目
    ///
    /// 全量导入时整表扫描后按 testId 过滤，否则逐个已有测试按 testId 查询；
    /// 新建的测试不会有已存储题目
    async fn fetch_persisted(
        &self,
        scoped: &ScopedDataset,
        plans: &[TestPlan<'_>],
        questions: &ContainerRef,
    ) -> AppResult<Vec<Value>> {
        let mut documents: Vec<Value> = Vec::new();

        if scoped.scope == ImportScope::All {
            let wanted: HashSet<&str> = plans.iter().map(|p| p.ctx.test_id.as_str()).collect();
            documents = self
                .reader
                .query(questions, &DocumentFilter::all())
                .await?
                .into_iter()
                .filter(|doc| {
                    doc.get("testId")
                        .and_then(Value::as_str)
                        .is_some_and(|test_id| wanted.contains(test_id))
                })
                .collect();
        } else {
            for plan in plans.iter().filter(|p| p.change != TestChange::Create) {
                let found = self
                    .reader
                    .query(questions, &DocumentFilter::eq("testId", plan.ctx.test_id.as_str()))
                    .await?;
                debug!("{} 已存储题目 {} 道", plan.ctx, found.len());
                documents.extend(found);
            }
        }

        Ok(documents)
    }

    /// 逐个检查写入过的测试：题目数量应等于 Test.length
    ///
    /// 不一致只告警，返回不一致的测试数
    async fn verify(&self, touched: &[&TestPlan<'_>], questions: &ContainerRef) -> AppResult<usize> {
        let mut mismatches = 0;
        for plan in touched {
            let count = self
                .reader
                .query(questions, &DocumentFilter::eq("testId", plan.ctx.test_id.as_str()))
                .await?
                .len();
            if count != plan.record.length {
                mismatches += 1;
                warn!(
                    "{} ⚠️ 题目数量 {} 与 Test.length {} 不一致",
                    plan.ctx, count, plan.record.length
                );
            }
        }
        if mismatches == 0 {
            info!("✓ {} 个测试校验通过", touched.len());
        }
        Ok(mismatches)
    }
}

fn enter(report: &mut ImportReport, stage: ImportStage) {
    log_stage(stage);
    report.stages.push(stage);
}

fn expect_role(handle: &str, store: &dyn DocumentStore, expected: StoreRole) -> AppResult<()> {
    if store.role() == expected {
        Ok(())
    } else {
        Err(StoreError::RoleMismatch {
            handle: handle.to_string(),
            expected: format!("{:?}", expected),
        }
        .into())
    }
}

fn test_filter(scope: &ImportScope) -> DocumentFilter {
    match scope {
        ImportScope::All => DocumentFilter::all(),
        ImportScope::Course { course_name } => DocumentFilter::eq("courseName", course_name.as_str()),
        ImportScope::Test {
            course_name,
            test_name,
        } => DocumentFilter::eq("courseName", course_name.as_str())
            .and("testName", test_name.as_str()),
    }
}
