use serde::{Deserialize, Serialize};

/// 加密后的单个字符串
///
/// 存储为 0~255 的数字数组，与服务端读取时的结构一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ciphertext(pub Vec<u8>);

impl Ciphertext {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 标记哪些条目是图片 URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicateImgIdxes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Vec<usize>>,
}

/// 标记哪些条目不需要翻译
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscapeTranslatedIdxes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Vec<usize>>,
    /// 与选项一一对应，正确选项为 null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorrect_choices_explanations: Option<Vec<Option<Vec<usize>>>>,
}

/// 一道题目的内容
///
/// `T` 是文本单元的表示：明文为 `String`，加密后为 [`Ciphertext`]。
/// 文本字段为 `subjects`、`choices`、`explanations` 和
/// `incorrectChoicesExplanations` 中每个非 null 条目，其余字段两种表示下完全相同。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct QuestionContent<T> {
    /// 题号（从 1 开始）
    pub number: u32,
    /// 题干或图片 URL
    pub subjects: Vec<T>,
    /// 选项
    pub choices: Vec<T>,
    /// 正确选项的索引（多选时有多个）
    pub correct_idxes: Vec<usize>,
    /// 解析
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanations: Option<Vec<T>>,
    /// 错误选项的解析，正确选项为 null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorrect_choices_explanations: Option<Vec<Option<Vec<T>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicate_img_idxes: Option<IndicateImgIdxes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escape_translated_idxes: Option<EscapeTranslatedIdxes>,
    /// 参考链接
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
}

/// 题目的文本字段集合，用于在两种表示之间整体替换
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFields<T> {
    pub subjects: Vec<T>,
    pub choices: Vec<T>,
    pub explanations: Option<Vec<T>>,
    pub incorrect_choices_explanations: Option<Vec<Option<Vec<T>>>>,
}

impl<T> QuestionContent<T> {
    /// 保留非文本字段，用另一种表示的文本字段组装新的题目
    pub fn with_texts<U>(&self, texts: TextFields<U>) -> QuestionContent<U> {
        QuestionContent {
            number: self.number,
            subjects: texts.subjects,
            choices: texts.choices,
            correct_idxes: self.correct_idxes.clone(),
            explanations: texts.explanations,
            incorrect_choices_explanations: texts.incorrect_choices_explanations,
            indicate_img_idxes: self.indicate_img_idxes.clone(),
            escape_translated_idxes: self.escape_translated_idxes.clone(),
            references: self.references.clone(),
        }
    }
}

/// 作者编写的题目（明文）
pub type ImportItem = QuestionContent<String>;

/// 持久化的 Question 记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord<T> {
    /// `${testId}_${number}`
    pub id: String,
    pub test_id: String,
    #[serde(flatten)]
    pub content: QuestionContent<T>,
}

pub type PlainQuestion = QuestionRecord<String>;
pub type EncryptedQuestion = QuestionRecord<Ciphertext>;
