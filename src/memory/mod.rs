//! 持久化与长期记忆
//!
//! | 层次 | 实现 | 作用域 |
//! |------|------|--------|
//! | 会话记录 | [`TranscriptStore`] / [`FileTranscriptStore`] | 按 `(session_id, user_id)`，跨进程恢复同一会话 |
//! | 用户事实 | [`FactStore`] / [`FileFactStore`] | 按 `user_id`，跨会话共享 |
//! | 事实提取 | [`MemoryExtractor`] / [`LlmMemoryExtractor`] | 每轮对话结束后后台运行 |
//!
//! ```rust,no_run
//! use chef_agent::memory::{FactStore, FileFactStore};
//!
//! # async fn example() -> chef_agent::error::Result<()> {
//! let store = FileFactStore::new("tmp/chef_memory.json")?;
//! store.merge_facts("alice", "session_20261019_101500", vec!["Alice is vegetarian".into()]).await?;
//! let facts = store.facts_for_user("alice").await?;
//! # Ok(())
//! # }
//! ```

pub mod extractor;
pub mod facts;
mod file;
pub mod transcript;

pub use extractor::{CompletedTurn, LlmMemoryExtractor, MemoryExtractor, spawn_extraction};
pub use facts::{FactStore, FileFactStore, InMemoryFactStore, MemoryFact};
pub use transcript::{FileTranscriptStore, InMemoryTranscriptStore, SessionRecord, TranscriptStore};
