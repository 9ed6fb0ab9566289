//! Mock LLM 客户端，用于在不发起真实 HTTP 请求的情况下测试依赖 [`LlmClient`] 的组件。
//!
//! # 示例
//!
//! ```rust
//! use chef_agent::testing::MockLlmClient;
//! use chef_agent::llm::LlmClient;
//! use chef_agent::llm::types::Message;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mock = MockLlmClient::new()
//!     .with_response("第一次响应")
//!     .with_response("第二次响应");
//!
//! let r1 = mock.chat_simple(vec![Message::user("hi".to_string())], None).await.unwrap();
//! assert_eq!(r1, "第一次响应");
//! assert_eq!(mock.call_count(), 1);
//! # }
//! ```

use crate::error::InvocationError;
use crate::llm::LlmClient;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, Message, ToolCall};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 预设响应
enum MockLlmResponse {
    Message(Message),
    Delayed(Message, Duration),
    Err(InvocationError),
}

/// 可脚本化的 Mock LLM 客户端。
///
/// 按顺序返回预设的响应；队列耗尽后返回 `Remote("Empty response")` 错误。
/// 所有请求都被记录，可通过 [`call_count`](MockLlmClient::call_count) /
/// [`last_request`](MockLlmClient::last_request) 检查。
pub struct MockLlmClient {
    responses: Arc<Mutex<VecDeque<MockLlmResponse>>>,
    /// 每次调用收到的请求，按顺序记录
    calls: Arc<Mutex<Vec<ChatCompletionRequest>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(self, response: MockLlmResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// 追加一条文本响应
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(MockLlmResponse::Message(Message::assistant(text.into())))
    }

    /// 批量追加多条文本响应
    pub fn with_responses(mut self, texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for t in texts {
            self = self.with_response(t);
        }
        self
    }

    /// 追加一条工具调用响应，`arguments` 为 JSON 字符串
    pub fn with_tool_call(self, name: &str, arguments: &str) -> Self {
        let id = format!("call_{}", self.remaining());
        self.push(MockLlmResponse::Message(Message::assistant_with_tools(vec![
            ToolCall::function(id, name, arguments.to_string()),
        ])))
    }

    /// 延迟一段时间后才返回的文本响应，用于测试超时
    pub fn with_delayed_response(self, text: impl Into<String>, delay: Duration) -> Self {
        self.push(MockLlmResponse::Delayed(
            Message::assistant(text.into()),
            delay,
        ))
    }

    /// 追加一条错误响应
    pub fn with_error(self, err: InvocationError) -> Self {
        self.push(MockLlmResponse::Err(err))
    }

    /// 追加一条网络错误
    pub fn with_network_error(self, msg: impl Into<String>) -> Self {
        self.with_error(InvocationError::Transient(msg.into()))
    }

    /// 追加一条限流错误（429）
    pub fn with_rate_limit_error(self) -> Self {
        self.with_error(InvocationError::from_status(429, "Too Many Requests"))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 最后一次调用的请求（若从未调用则返回 `None`）
    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.calls.lock().unwrap().last().cloned()
    }

    /// 剩余未消费的预设响应数量
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InvocationError> {
        self.calls.lock().unwrap().push(request);

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(MockLlmResponse::Message(m)) => Ok(ChatCompletionResponse::from_message(m)),
            Some(MockLlmResponse::Delayed(m, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(ChatCompletionResponse::from_message(m))
            }
            Some(MockLlmResponse::Err(e)) => Err(e),
            None => Err(InvocationError::Remote(
                "Empty response from LLM".to_string(),
            )),
        }
    }
}
