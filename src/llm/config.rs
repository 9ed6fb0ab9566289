//! 模型连接配置
//!
//! 由 [`AppConfig`] 与 [`Credentials`] 组合而成，构造一次后在整个进程生命周期内复用。

use crate::config::{AppConfig, Credentials};
use serde::{Deserialize, Serialize};

/// 单个模型的连接配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    /// LLM 接口中使用的模型名（如 `gemini-2.0-flash`）
    pub model: String,
    /// Chat Completions 接口完整 URL
    pub baseurl: String,
    #[serde(skip_serializing)]
    pub apikey: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn from_app(config: &AppConfig, credentials: &Credentials) -> Self {
        Self {
            model: config.model.clone(),
            baseurl: config.base_url.clone(),
            apikey: credentials.model_api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}
