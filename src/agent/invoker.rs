use crate::agent::composer::ModelRequest;
use crate::error::{ChefError, InvocationError, ToolError};
use crate::llm::LlmClient;
use crate::llm::types::{ChatCompletionRequest, Message, ToolCall};
use crate::tools::{ToolManager, ToolParameters};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 模型调用的超时、重试与工具轮次限制
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// 单次尝试（含其中的全部工具往返）的超时
    pub request_timeout: Duration,
    /// 瞬时错误的最大自动重试次数（0 = 不重试）
    pub max_retries: u32,
    /// 首次重试前的等待，之后每次翻倍
    pub retry_delay: Duration,
    /// 一次调用内允许的最大模型往返次数
    pub max_tool_rounds: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            max_tool_rounds: 4,
        }
    }
}

/// 模型的最终回复
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub used_tools: bool,
    /// 本轮依次调用过的工具名
    pub tool_calls: Vec<String>,
}

/// 调用远程模型，并在模型要求时代为执行工具。
///
/// 工具调用对调用方不可见，只能通过 [`AssistantReply::used_tools`] 观察到。
pub struct ModelInvoker {
    llm: Arc<dyn LlmClient>,
    tools: ToolManager,
    config: InvokerConfig,
}

impl ModelInvoker {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolManager, config: InvokerConfig) -> Self {
        Self { llm, tools, config }
    }

    pub async fn invoke(&self, request: &ModelRequest) -> Result<AssistantReply, InvocationError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = match tokio::time::timeout(
                self.config.request_timeout,
                self.run_once(request),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(InvocationError::Transient(format!(
                    "model call timed out after {}s",
                    self.config.request_timeout.as_secs_f32()
                ))),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(self.config.retry_delay, attempt);
                    warn!(
                        session_id = %request.session_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "⚠️ 模型调用失败，准备重试"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn run_once(&self, request: &ModelRequest) -> Result<AssistantReply, InvocationError> {
        let mut messages = request.messages.clone();
        let mut tool_calls: Vec<String> = Vec::new();
        let tool_defs = (!self.tools.is_empty()).then(|| self.tools.get_tool_definitions());

        for round in 0..self.config.max_tool_rounds {
            debug!(session_id = %request.session_id, round, "🧠 调用模型");
            let response = self
                .llm
                .chat(ChatCompletionRequest {
                    model: String::new(),
                    messages: messages.clone(),
                    tool_choice: tool_defs.as_ref().map(|_| "auto".to_string()),
                    tools: tool_defs.clone(),
                    temperature: None,
                    max_tokens: None,
                })
                .await?;

            let message = response
                .first_message()
                .ok_or_else(|| InvocationError::Remote("Empty response from LLM".to_string()))?;

            let calls = message.tool_calls.clone().unwrap_or_default();
            if !calls.is_empty() {
                messages.push(message);
                for call in calls {
                    let output = self.run_tool(&call).await?;
                    tool_calls.push(call.function.name.clone());
                    messages.push(Message::tool_result(call.id, call.function.name, output));
                }
                continue;
            }

            let content = message.content.unwrap_or_default();
            if content.trim().is_empty() {
                return Err(InvocationError::Remote(
                    "Empty response from LLM".to_string(),
                ));
            }
            return Ok(AssistantReply {
                content,
                used_tools: !tool_calls.is_empty(),
                tool_calls,
            });
        }

        Err(InvocationError::Remote(format!(
            "no final answer after {} tool rounds",
            self.config.max_tool_rounds
        )))
    }

    /// 执行单个工具调用，返回回传给模型的文本。
    ///
    /// 参数无法解析或工具不存在属于模型侧错误；工具本身失败则作为文本回传，让模型自行处理。
    async fn run_tool(&self, call: &ToolCall) -> Result<String, InvocationError> {
        let name = call.function.name.as_str();
        let params: ToolParameters = if call.function.arguments.trim().is_empty() {
            ToolParameters::new()
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                InvocationError::Remote(format!("malformed arguments for tool '{name}': {e}"))
            })?
        };

        info!(tool = %name, args = %call.function.arguments, "🚀 调用工具");
        match self.tools.execute_tool(name, params).await {
            Ok(result) => Ok(result.to_model_text()),
            Err(ChefError::Tool(ToolError::NotFound(_))) => Err(InvocationError::Remote(format!(
                "model requested unknown tool '{name}'"
            ))),
            Err(e) => {
                warn!(tool = %name, error = %e, "工具执行失败，错误回传给模型");
                Ok(format!("tool failed: {e}"))
            }
        }
    }
}

/// 第 `attempt` 次重试前的等待：`base * 2^attempt`，指数上限为 5，溢出时取 `Duration::MAX`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(1 << attempt.min(5)).unwrap_or(Duration::MAX)
}
