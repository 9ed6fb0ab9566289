//! 对话核心：组装上下文（[`TurnComposer`]）与调用模型（[`ModelInvoker`]）
//!
//! 两者在进程启动时构造一次，由 [`ChefAssistant`](crate::assistant::ChefAssistant) 持有并在每轮对话中复用。

pub mod composer;
pub mod invoker;
pub mod persona;

pub use composer::{ModelRequest, TurnComposer};
pub use invoker::{AssistantReply, InvokerConfig, ModelInvoker};
