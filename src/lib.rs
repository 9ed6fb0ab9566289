pub mod agent;
pub mod assistant;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod session;
pub mod testing;
pub mod tools;

pub mod prelude {
    pub use crate::agent::{AssistantReply, InvokerConfig, ModelInvoker, ModelRequest, TurnComposer};
    pub use crate::assistant::{ChefAssistant, SessionInfo, TurnOutcome};
    pub use crate::config::{AppConfig, Credentials};
    pub use crate::error::{ChefError, InvocationError, Result};
    pub use crate::session::{ChatMessage, Role, SessionController};
    pub use crate::tools::{Tool, ToolParameters, ToolResult};
}
