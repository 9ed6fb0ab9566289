//! 测试基础设施
//!
//! 提供在不依赖真实 LLM / 外部服务的情况下测试各组件的工具集。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockLlmClient`] | 替代真实 LLM，可预设文本、工具调用、错误与延迟 |
//! | [`MockSearch`] | 替代 Exa 搜索服务 |
//! | [`FailingTranscriptStore`] / [`FailingFactStore`] | 总是失败的存储，用于测试降级路径 |
//!
//! # 使用示例
//!
//! ```rust
//! use chef_agent::agent::{InvokerConfig, ModelInvoker, TurnComposer};
//! use chef_agent::testing::MockLlmClient;
//! use chef_agent::tools::ToolManager;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let llm = Arc::new(MockLlmClient::new().with_response("Try a frittata."));
//! let invoker = ModelInvoker::new(llm.clone(), ToolManager::new(), InvokerConfig::default());
//! let request = TurnComposer::new("You are ChefGenius.", 5)
//!     .compose("s1", "u1", "I have eggs", &[], &[]);
//!
//! let reply = invoker.invoke(&request).await.unwrap();
//! assert_eq!(reply.content, "Try a frittata.");
//! assert_eq!(llm.call_count(), 1);
//! # }
//! ```

mod mock_llm;
mod mock_search;
mod mock_store;

pub use mock_llm::MockLlmClient;
pub use mock_search::MockSearch;
pub use mock_store::{FailingFactStore, FailingTranscriptStore};
