use thiserror::Error;

/// ChefGenius 的统一错误类型
#[derive(Debug, Error)]
pub enum ChefError {
    /// 配置错误（启动期致命）
    #[error("Config Error: {0}")]
    Config(#[from] ConfigError),
    /// 模型调用错误
    #[error("Invocation Error: {0}")]
    Invocation(#[from] InvocationError),
    /// 工具执行错误
    #[error("Tool Error: {0}")]
    Tool(#[from] ToolError),
    /// 持久化存储错误
    #[error("Memory Error: {0}")]
    Memory(#[from] MemoryError),
    /// IO 错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON 解析错误
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    /// 其他错误
    #[error("Error: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少必需的凭据环境变量
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),
    /// 配置文件未找到
    #[error("Config file not found: {0}")]
    FileNotFound(String),
    /// 配置解析失败
    #[error("Failed to parse config: {0}")]
    ParseFailed(String),
    /// 配置值无效
    #[error("Invalid config value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// 模型调用错误，按可恢复性分类
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvocationError {
    /// 凭据缺失或无效，重试无意义
    #[error("configuration error: {0}")]
    Configuration(String),
    /// 网络 / 超时 / 限流，可原样重试
    #[error("transient error: {0}")]
    Transient(String),
    /// 模型侧失败（内容策略、响应格式、工具调用异常等）
    #[error("remote error: {0}")]
    Remote(String),
}

impl InvocationError {
    /// 是否值得自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, InvocationError::Transient(_))
    }

    /// 写入会话记录的助手侧错误文本
    pub fn user_message(&self) -> String {
        match self {
            InvocationError::Transient(msg) => format!(
                "Sorry, I couldn't reach the kitchen just now ({msg}). Please try sending that again."
            ),
            InvocationError::Configuration(msg) | InvocationError::Remote(msg) => {
                format!("Sorry, I encountered an error: {msg}")
            }
        }
    }

    /// 按 HTTP 状态码归类
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("API error (status {status}): {body}");
        match status {
            401 | 403 => InvocationError::Configuration(message),
            408 | 429 => InvocationError::Transient(message),
            s if s >= 500 => InvocationError::Transient(message),
            _ => InvocationError::Remote(message),
        }
    }
}

impl From<reqwest::Error> for InvocationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InvocationError::Transient("Request timeout".to_string())
        } else if err.is_connect() {
            InvocationError::Transient(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            InvocationError::Remote(format!("Invalid response: {err}"))
        } else if let Some(status) = err.status() {
            InvocationError::from_status(status.as_u16(), &err.to_string())
        } else {
            InvocationError::Transient(err.to_string())
        }
    }
}

/// 工具执行错误
#[derive(Debug, Error)]
pub enum ToolError {
    /// 工具未找到
    #[error("Tool '{0}' not found")]
    NotFound(String),
    /// 参数缺失
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    /// 工具执行超时
    #[error("Tool '{0}' timed out")]
    Timeout(String),
}

/// 持久化存储错误
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// 读取历史失败（调用方降级为空历史）
    #[error("Failed to read persisted data: {0}")]
    ReadFailed(String),
}

impl From<serde_yaml::Error> for ChefError {
    fn from(err: serde_yaml::Error) -> Self {
        ChefError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, ChefError>;
