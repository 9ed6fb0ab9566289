//! 总是失败的存储，用于验证读取失败时的降级路径

use crate::error::{MemoryError, Result};
use crate::memory::facts::{FactStore, MemoryFact};
use crate::memory::transcript::{SessionRecord, TranscriptStore};
use crate::session::ChatMessage;
use async_trait::async_trait;

pub struct FailingTranscriptStore;

#[async_trait]
impl TranscriptStore for FailingTranscriptStore {
    async fn save(&self, _session_id: &str, _user_id: &str, _messages: &[ChatMessage]) -> Result<()> {
        Err(MemoryError::Io("disk full".to_string()).into())
    }

    async fn load(&self, _session_id: &str, _user_id: &str) -> Result<Vec<ChatMessage>> {
        Err(MemoryError::ReadFailed("database is locked".to_string()).into())
    }

    async fn list_sessions(&self, _user_id: &str) -> Result<Vec<SessionRecord>> {
        Err(MemoryError::ReadFailed("database is locked".to_string()).into())
    }
}

pub struct FailingFactStore;

#[async_trait]
impl FactStore for FailingFactStore {
    async fn upsert(&self, _fact: MemoryFact) -> Result<()> {
        Err(MemoryError::Io("disk full".to_string()).into())
    }

    async fn facts_for_user(&self, _user_id: &str) -> Result<Vec<MemoryFact>> {
        Err(MemoryError::ReadFailed("database is locked".to_string()).into())
    }
}
