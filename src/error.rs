use thiserror::Error;

/// 导入程序错误类型
///
/// 按类别拆分：配置、数据集、文件、文档存储、加解密、一致性。
/// 任何一类错误都会终止整个导入运行。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（环境变量、CLI 参数、密钥/机密缺失）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 导入数据集内容不合法
    #[error("数据集错误: {0}")]
    Dataset(#[from] DatasetError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 文档存储错误
    #[error("文档存储错误: {0}")]
    Store(#[from] StoreError),
    /// 密钥服务错误（加解密以外的调用）
    #[error("密钥服务错误: {0}")]
    KeyService(#[from] KeyServiceError),
    /// 字段加解密错误
    #[error("加解密错误: {0}")]
    Crypto(#[from] CryptoError),
    /// 数据一致性错误
    #[error("数据一致性错误: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 命令行参数非法（数量不对，或课程/测试名不存在）
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },
    /// Key Vault 中找不到机密
    #[error("Key Vault 机密 \"{name}\" 不存在")]
    SecretNotFound { name: String },
    /// Key Vault 中找不到加密密钥
    #[error("Key Vault 密钥 \"{name}\" 不存在")]
    KeyNotFound { name: String },
    /// 文档存储主密钥格式错误
    #[error("文档存储主密钥无效: {reason}")]
    InvalidStoreKey { reason: String },
}

/// 数据集错误
#[derive(Debug, Error)]
pub enum DatasetError {
    /// 索引超出数组范围
    #[error("[{course_name} / {test_name} #{number}] {field} 的索引 {index} 超出范围 (长度 {len})")]
    IndexOutOfRange {
        course_name: String,
        test_name: String,
        number: u32,
        field: String,
        index: usize,
        len: usize,
    },
    /// 题号重复（会导致复合 id 冲突）
    #[error("[{course_name} / {test_name}] 题号 {number} 重复")]
    DuplicateNumber {
        course_name: String,
        test_name: String,
        number: u32,
    },
    /// 题号必须从 1 开始
    #[error("[{course_name} / {test_name}] 题号必须 >= 1")]
    ZeroNumber {
        course_name: String,
        test_name: String,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON / TOML 解析失败
    #[error("解析文件失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 不支持的文件格式
    #[error("不支持的文件格式: {path}")]
    UnsupportedFormat { path: String },
}

/// 文档存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 网络请求失败
    #[error("请求失败 ({operation}): {source}")]
    RequestFailed {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    /// 存储返回非成功状态（写入以外的操作）
    #[error("存储返回错误响应 ({operation}): status={status}, message={message}")]
    BadResponse {
        operation: String,
        status: u16,
        message: String,
    },
    /// Upsert 返回非成功状态
    #[error("Status Code {status} ({container}): {record}")]
    WriteFailed {
        container: String,
        status: u16,
        record: String,
    },
    /// 只读客户端被用于写操作
    #[error("只读客户端不允许执行 {operation}")]
    ReadOnlyClient { operation: String },
    /// 客户端角色与用途不符
    #[error("{handle} 客户端的角色应为 {expected}")]
    RoleMismatch { handle: String, expected: String },
    /// 待写入的文档缺少 id
    #[error("文档缺少 id 字段 ({container})")]
    MissingId { container: String },
    /// 文档结构与预期不符
    #[error("文档解析失败 ({container}): {source}")]
    MalformedDocument {
        container: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 密钥服务原始错误
#[derive(Debug, Error)]
pub enum KeyServiceError {
    /// 网络请求失败
    #[error("请求失败: {0}")]
    Request(#[from] reqwest::Error),
    /// 服务拒绝请求
    #[error("服务返回错误: status={status}, message={message}")]
    Rejected { status: u16, message: String },
    /// 响应内容无法解码
    #[error("响应解码失败: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// 字段加解密错误
///
/// 只携带位置信息与字符串长度，绝不携带明文。
#[derive(Debug, Error)]
pub enum CryptoError {
    /// 加密失败
    #[error("第 {item_index} 个题目 {field}[{string_index}] 加密失败 ({length} 字节): {source}")]
    EncryptFailed {
        item_index: usize,
        field: String,
        string_index: usize,
        length: usize,
        #[source]
        source: KeyServiceError,
    },
    /// 解密失败
    #[error("第 {item_index} 个题目 {field}[{string_index}] 解密失败 ({length} 字节): {source}")]
    DecryptFailed {
        item_index: usize,
        field: String,
        string_index: usize,
        length: usize,
        #[source]
        source: KeyServiceError,
    },
    /// 解密结果不是合法 UTF-8
    #[error("第 {item_index} 个题目 {field}[{string_index}] 解密结果不是 UTF-8 ({length} 字节)")]
    InvalidUtf8 {
        item_index: usize,
        field: String,
        string_index: usize,
        length: usize,
    },
}

/// 数据一致性错误
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// 同一 (courseName, testName) 存在多个 Test
    #[error("Not Unique Test: {course_name} / {test_name} ({count} 条)")]
    NotUniqueTest {
        course_name: String,
        test_name: String,
        count: usize,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建非法参数错误
    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidArguments {
            reason: reason.into(),
        })
    }

    /// 创建存储请求失败错误
    pub fn store_request_failed(operation: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Store(StoreError::RequestFailed {
            operation: operation.into(),
            source,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件解析错误
    pub fn file_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 是否为配置类错误
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
