use thiserror::Error;

use crate::models::FailureReason;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（整次运行致命）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 外部调用错误
    #[error("外部调用错误: {0}")]
    Call(#[from] CallError),
    /// 响应解析错误
    #[error("响应解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 输入文件错误
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
    /// 文件读写错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
    /// JSON 序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
///
/// 在阶段开始前（任何外部调用之前）检测，直接终止整次运行。
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// 批大小非法
    #[error("阶段 {stage} 的批大小必须大于 0")]
    InvalidBatchSize { stage: String },
    /// 阶段上限非法
    #[error("阶段 {stage} 的最大条目数必须大于 0")]
    InvalidStageLimit { stage: String },
    /// 每分钟请求上限非法
    #[error("每分钟请求上限必须大于 0")]
    InvalidRateCeiling,
    /// 时间间隔非法（负数或非有限值）
    #[error("{name} 必须是非负的有限秒数，实际为 {value}")]
    InvalidInterval { name: String, value: f64 },
    /// 并发批次数非法
    #[error("最大并发批次数必须大于 0")]
    InvalidConcurrency,
    /// 未知预设
    #[error("未知的预设配置: {name}")]
    UnknownPreset { name: String },
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {message}")]
    FileReadFailed { path: String, message: String },
    /// 配置文件解析失败
    #[error("无法解析配置文件 {path}: {message}")]
    FileParseFailed { path: String, message: String },
}

/// 单次外部调用的失败
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CallError {
    /// 调用超时
    #[error("调用超时 ({secs:.1} 秒)")]
    Timeout { secs: f64 },
    /// 传输层失败（连接、HTTP 状态等）
    #[error("传输失败: {0}")]
    Transport(String),
    /// 服务端限流
    #[error("服务端限流: {0}")]
    RateLimited(String),
    /// 响应内容无法使用
    #[error("响应格式错误: {0}")]
    Malformed(String),
    /// 能力未配置（空实现）
    #[error("能力不可用: {0}")]
    Unavailable(String),
}

impl CallError {
    /// 映射到对外的失败原因
    pub fn reason(&self) -> FailureReason {
        match self {
            CallError::Timeout { .. } => FailureReason::Timeout,
            CallError::Transport(_) | CallError::Unavailable(_) => FailureReason::TransportError,
            CallError::RateLimited(_) => FailureReason::RateLimitDenied,
            CallError::Malformed(_) => FailureReason::MalformedResponse,
        }
    }
}

/// 响应解析错误，一律视为 `MalformedResponse`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// 响应中找不到 JSON
    #[error("响应中没有可解析的 JSON")]
    NoJson,
    /// JSON 解码失败
    #[error("JSON 解码失败: {0}")]
    Decode(String),
    /// 条目数量与发送数量不一致
    #[error("期望 {expected} 个条目，实际得到 {actual} 个")]
    Cardinality { expected: usize, actual: usize },
    /// 条目编号与发送的编号对不上
    #[error("响应中的专利号 {found} 不在本批次中")]
    UnknownIdentifier { found: String },
}

impl From<ParseError> for CallError {
    fn from(err: ParseError) -> Self {
        CallError::Malformed(err.to_string())
    }
}

/// 输入文件错误
#[derive(Debug, Error)]
pub enum InputError {
    /// 文件不存在
    #[error("输入文件不存在: {path}")]
    NotFound { path: String },
    /// 不支持的文件类型
    #[error("不支持的输入文件类型: {path}（仅支持 .json / .toml）")]
    UnsupportedType { path: String },
    /// 解析失败
    #[error("无法解析输入文件 {path}: {message}")]
    ParseFailed { path: String, message: String },
    /// 发明名称为空
    #[error("发明名称不能为空")]
    EmptyInventionName,
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建其他错误
    pub fn other(message: impl Into<String>) -> Self {
        AppError::Other(message.into())
    }
}

impl ConfigError {
    pub(crate) fn invalid_batch_size(stage: impl Into<String>) -> Self {
        ConfigError::InvalidBatchSize {
            stage: stage.into(),
        }
    }

    pub(crate) fn invalid_stage_limit(stage: impl Into<String>) -> Self {
        ConfigError::InvalidStageLimit {
            stage: stage.into(),
        }
    }

    pub(crate) fn invalid_interval(name: impl Into<String>, value: f64) -> Self {
        ConfigError::InvalidInterval {
            name: name.into(),
            value,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
