//! 应用配置
//!
//! 两部分：
//! - [`Credentials`]：模型与搜索服务的密钥，仅从环境变量（含 `.env`）读取一次
//! - [`AppConfig`]：其余可调参数，来自 YAML 文件，缺省字段使用默认值
//!
//! ```yaml
//! model: gemini-2.0-flash
//! history_turns: 5
//! request_timeout_secs: 60
//! user_id: alice
//! ```

use crate::error::{ConfigError, Result};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};

pub const MODEL_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const SEARCH_KEY_ENV: &str = "EXA_API_KEY";

/// 首次重试等待的上限（毫秒）
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// 启动时读取的两项必需凭据
#[derive(Clone)]
pub struct Credentials {
    pub model_api_key: String,
    pub search_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("model_api_key", &"***")
            .field("search_api_key", &"***")
            .finish()
    }
}

impl Credentials {
    /// 从进程环境读取凭据，任一缺失即返回 [`ConfigError::MissingCredential`]
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数读取，便于测试时不触碰真实环境变量
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fetch = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingCredential(key.to_string()))
        };
        Ok(Self {
            model_api_key: fetch(MODEL_KEY_ENV)?,
            search_api_key: fetch(SEARCH_KEY_ENV)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// 模型名（OpenAI 兼容接口中的 `model` 字段）
    pub model: String,
    /// Chat Completions 接口完整 URL
    pub base_url: String,
    /// Exa 搜索接口 URL
    pub search_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 每轮请求携带的历史轮数（一问一答为一轮）
    pub history_turns: usize,
    pub request_timeout_secs: u64,
    /// 瞬时错误的自动重试次数
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// 单轮内允许的工具调用往返次数
    pub max_tool_rounds: usize,
    pub search_results: usize,
    pub sessions_path: String,
    pub memory_path: String,
    pub user_id: String,
    /// 是否启用长期记忆提取与注入
    pub enable_memory: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                .to_string(),
            search_url: "https://api.exa.ai/search".to_string(),
            temperature: 0.7,
            max_tokens: 8192,
            history_turns: 5,
            request_timeout_secs: 60,
            max_retries: 2,
            retry_delay_ms: 500,
            max_tool_rounds: 4,
            search_results: 5,
            sessions_path: "tmp/chef_sessions.json".to_string(),
            memory_path: "tmp/chef_memory.json".to_string(),
            user_id: "cli_user".to_string(),
            enable_memory: true,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: AppConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// 指定了路径则加载该文件，否则使用默认值
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_turns == 0 {
            return Err(invalid("history_turns", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be greater than 0"));
        }
        if self.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(invalid("retry_delay_ms", "must be at most 60000"));
        }
        if self.max_tool_rounds == 0 {
            return Err(invalid("max_tool_rounds", "must be at least 1"));
        }
        if self.user_id.trim().is_empty() {
            return Err(invalid("user_id", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> crate::error::ChefError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}
