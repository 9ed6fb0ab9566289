mod client;
pub mod config;
pub mod types;

use crate::error::{ChefError, InvocationError};
use crate::llm::client::post;
use crate::llm::config::ModelConfig;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, Message};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::sync::Arc;

pub fn assemble_req_header(model: &ModelConfig) -> Result<HeaderMap, InvocationError> {
    let mut header_map = HeaderMap::new();

    header_map.insert(
        "Authorization",
        format!("Bearer {}", model.apikey).parse().map_err(|e| {
            InvocationError::Configuration(format!("Invalid Authorization header: {e}"))
        })?,
    );
    header_map.insert(
        "Content-Type",
        "application/json".parse().map_err(|e| {
            InvocationError::Configuration(format!("Invalid Content-Type header: {e}"))
        })?,
    );
    Ok(header_map)
}

/// 远程模型调用接口，Model Invoker 与记忆提取都通过它访问 LLM
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 发起一次完整的 chat completion 请求（`model` 字段由实现填充）
    async fn chat(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InvocationError>;

    /// 发起一次简单的无工具对话，返回模型的文本内容
    async fn chat_simple(
        &self,
        messages: Vec<Message>,
        temperature: Option<f32>,
    ) -> Result<String, InvocationError> {
        let response = self
            .chat(ChatCompletionRequest {
                model: String::new(),
                messages,
                tools: None,
                tool_choice: None,
                temperature,
                max_tokens: Some(2048),
            })
            .await?;

        response
            .first_message()
            .and_then(|m| m.content)
            .ok_or_else(|| InvocationError::Remote("Empty response from LLM".to_string()))
    }
}

/// 基于 reqwest 的 OpenAI 兼容实现
pub struct HttpLlmClient {
    client: Arc<Client>,
    model: ModelConfig,
    header_map: HeaderMap,
}

impl HttpLlmClient {
    /// 请求头在构造时一次性组装，凭据异常在首轮对话之前暴露
    pub fn new(client: Arc<Client>, model: ModelConfig) -> Result<Self, ChefError> {
        let header_map = assemble_req_header(&model)?;
        Ok(Self {
            client,
            model,
            header_map,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InvocationError> {
        request.model = self.model.model.clone();
        request.temperature = request.temperature.or(Some(self.model.temperature));
        request.max_tokens = request.max_tokens.or(Some(self.model.max_tokens));
        post(
            self.client.clone(),
            &request,
            self.header_map.clone(),
            self.model.baseurl.as_str(),
        )
        .await
    }
}
