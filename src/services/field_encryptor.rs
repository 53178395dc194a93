//! 字段加解密 - 业务能力层
//!
//! 每个文本字符串单独调用一次密钥服务。错误只带位置和长度，不带明文。

use crate::error::{AppError, AppResult, CryptoError};
use crate::infrastructure::KeyService;
use crate::models::{
    Ciphertext, EncryptedQuestion, PlainQuestion, QuestionContent, QuestionRecord, TextFields,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// 字段加解密器
///
/// 职责：
/// - 加密 / 解密单道题目的文本字段（同一题目内逐个字符串顺序处理）
/// - 对一批题目并发处理，并发度有上限
/// - 不处理非文本字段，缺失的字段保持缺失
#[derive(Clone)]
pub struct FieldEncryptor {
    key: Arc<dyn KeyService>,
    max_concurrent: usize,
}

impl FieldEncryptor {
    pub fn new(key: Arc<dyn KeyService>, max_concurrent: usize) -> Self {
        Self {
            key,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 加密一道题目的文本字段
    ///
    /// `item_index` 仅用于错误定位
    pub async fn encrypt_fields(
        &self,
        item_index: usize,
        content: &QuestionContent<String>,
    ) -> AppResult<QuestionContent<Ciphertext>> {
        let subjects = self
            .encrypt_list(item_index, "subjects", &content.subjects)
            .await?;
        let choices = self
            .encrypt_list(item_index, "choices", &content.choices)
            .await?;

        let explanations = match &content.explanations {
            Some(texts) => Some(self.encrypt_list(item_index, "explanations", texts).await?),
            None => None,
        };

        let incorrect_choices_explanations = match &content.incorrect_choices_explanations {
            Some(entries) => {
                let mut encrypted = Vec::with_capacity(entries.len());
                for (choice_idx, entry) in entries.iter().enumerate() {
                    encrypted.push(match entry {
                        Some(texts) => Some(
                            self.encrypt_list(item_index, &ice_field(choice_idx), texts)
                                .await?,
                        ),
                        None => None,
                    });
                }
                Some(encrypted)
            }
            None => None,
        };

        Ok(content.with_texts(TextFields {
            subjects,
            choices,
            explanations,
            incorrect_choices_explanations,
        }))
    }

    /// 解密一道题目的文本字段，是 [`FieldEncryptor::encrypt_fields`] 的逆操作
    pub async fn decrypt_fields(
        &self,
        item_index: usize,
        content: &QuestionContent<Ciphertext>,
    ) -> AppResult<QuestionContent<String>> {
        let subjects = self
            .decrypt_list(item_index, "subjects", &content.subjects)
            .await?;
        let choices = self
            .decrypt_list(item_index, "choices", &content.choices)
            .await?;

        let explanations = match &content.explanations {
            Some(cells) => Some(self.decrypt_list(item_index, "explanations", cells).await?),
            None => None,
        };

        let incorrect_choices_explanations = match &content.incorrect_choices_explanations {
            Some(entries) => {
                let mut decrypted = Vec::with_capacity(entries.len());
                for (choice_idx, entry) in entries.iter().enumerate() {
                    decrypted.push(match entry {
                        Some(cells) => Some(
                            self.decrypt_list(item_index, &ice_field(choice_idx), cells)
                                .await?,
                        ),
                        None => None,
                    });
                }
                Some(decrypted)
            }
            None => None,
        };

        Ok(content.with_texts(TextFields {
            subjects,
            choices,
            explanations,
            incorrect_choices_explanations,
        }))
    }

    /// 并发加密一批题目记录，结果顺序与输入一致
    pub async fn encrypt_records(&self, records: &[PlainQuestion]) -> AppResult<Vec<EncryptedQuestion>> {
        debug!("🔒 加密 {} 道题目 (并发 {})", records.len(), self.max_concurrent);
        stream::iter(records.iter().enumerate())
            .map(|(item_index, record)| async move {
                Ok::<_, AppError>(QuestionRecord {
                    id: record.id.clone(),
                    test_id: record.test_id.clone(),
                    content: self.encrypt_fields(item_index, &record.content).await?,
                })
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await
    }

    /// 并发解密一批题目记录，结果顺序与输入一致
    pub async fn decrypt_records(&self, records: &[EncryptedQuestion]) -> AppResult<Vec<PlainQuestion>> {
        debug!("🔓 解密 {} 道题目 (并发 {})", records.len(), self.max_concurrent);
        stream::iter(records.iter().enumerate())
            .map(|(item_index, record)| async move {
                Ok::<_, AppError>(QuestionRecord {
                    id: record.id.clone(),
                    test_id: record.test_id.clone(),
                    content: self.decrypt_fields(item_index, &record.content).await?,
                })
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await
    }

    async fn encrypt_list(
        &self,
        item_index: usize,
        field: &str,
        texts: &[String],
    ) -> AppResult<Vec<Ciphertext>> {
        let mut cells = Vec::with_capacity(texts.len());
        for (string_index, text) in texts.iter().enumerate() {
            let bytes = self.key.encrypt(text.as_bytes()).await.map_err(|source| {
                CryptoError::EncryptFailed {
                    item_index,
                    field: field.to_string(),
                    string_index,
                    length: text.len(),
                    source,
                }
            })?;
            cells.push(Ciphertext(bytes));
        }
        Ok(cells)
    }

    async fn decrypt_list(
        &self,
        item_index: usize,
        field: &str,
        cells: &[Ciphertext],
    ) -> AppResult<Vec<String>> {
        let mut texts = Vec::with_capacity(cells.len());
        for (string_index, cell) in cells.iter().enumerate() {
            let bytes = self.key.decrypt(cell.as_bytes()).await.map_err(|source| {
                CryptoError::DecryptFailed {
                    item_index,
                    field: field.to_string(),
                    string_index,
                    length: cell.len(),
                    source,
                }
            })?;
            let text = String::from_utf8(bytes).map_err(|e| CryptoError::InvalidUtf8 {
                item_index,
                field: field.to_string(),
                string_index,
                length: e.as_bytes().len(),
            })?;
            texts.push(text);
        }
        Ok(texts)
    }
}

fn ice_field(choice_idx: usize) -> String {
    format!("incorrectChoicesExplanations[{}]", choice_idx)
}
