//! 会话记录持久化
//!
//! 按 `(user_id, session_id)` 保存整段对话记录，每次写入都是整行 upsert，
//! 进程重启后可通过 [`SessionController::load_history`](crate::session::SessionController::load_history)
//! 显式恢复。
//!
//! | 类型 | 说明 |
//! |------|------|
//! | [`InMemoryTranscriptStore`] | 进程内存，重启即清空，适合测试 |
//! | [`FileTranscriptStore`] | JSON 文件持久化，适合本地单机场景 |

use crate::error::Result;
use crate::memory::file::{prepare_path, read_table, write_table};
use crate::session::ChatMessage;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// 一个会话的持久化行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// 会话记录存储接口
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// 以完整消息列表覆盖该会话的记录
    async fn save(&self, session_id: &str, user_id: &str, messages: &[ChatMessage]) -> Result<()>;

    /// 读取会话记录，不存在时返回空列表
    async fn load(&self, session_id: &str, user_id: &str) -> Result<Vec<ChatMessage>>;

    /// 列出某用户的全部会话，最近更新的在前
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>>;
}

type Table = HashMap<String, SessionRecord>;

fn row_key(session_id: &str, user_id: &str) -> String {
    format!("{user_id}/{session_id}")
}

fn upsert(table: &mut Table, session_id: &str, user_id: &str, messages: &[ChatMessage]) {
    let now = Local::now();
    table
        .entry(row_key(session_id, user_id))
        .and_modify(|row| {
            row.messages = messages.to_vec();
            row.updated_at = now;
        })
        .or_insert_with(|| SessionRecord {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            messages: messages.to_vec(),
            created_at: now,
            updated_at: now,
        });
}

fn sessions_of(table: &Table, user_id: &str) -> Vec<SessionRecord> {
    let mut rows: Vec<SessionRecord> = table
        .values()
        .filter(|r| r.user_id == user_id)
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    rows
}

// ── InMemoryTranscriptStore ───────────────────────────────────────────────────

pub struct InMemoryTranscriptStore {
    data: RwLock<Table>,
}

impl Default for InMemoryTranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn save(&self, session_id: &str, user_id: &str, messages: &[ChatMessage]) -> Result<()> {
        upsert(&mut *self.data.write().await, session_id, user_id, messages);
        Ok(())
    }

    async fn load(&self, session_id: &str, user_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .data
            .read()
            .await
            .get(&row_key(session_id, user_id))
            .map(|r| r.messages.clone())
            .unwrap_or_default())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        Ok(sessions_of(&*self.data.read().await, user_id))
    }
}

// ── FileTranscriptStore ───────────────────────────────────────────────────────

/// 基于 JSON 文件的会话记录存储
///
/// 每次读取都直接读盘，写入时在互斥锁内完成「读取-修改-写回」，
/// 因此文件损坏会以 [`MemoryError::ReadFailed`](crate::error::MemoryError::ReadFailed) 的形式暴露给调用方。
///
/// 存储格式（key 为 `user_id/session_id`）：
/// ```json
/// {
///   "alice/session_20261019_101500": {
///     "session_id": "session_20261019_101500", "user_id": "alice", "messages": [...],
///     "created_at": "...", "updated_at": "..."
///   }
/// }
/// ```
pub struct FileTranscriptStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTranscriptStore {
    /// 打开或创建存储文件，自动建父目录
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = prepare_path(path.as_ref())?;
        info!(path = %path.display(), "🗂️ FileTranscriptStore 初始化");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl TranscriptStore for FileTranscriptStore {
    async fn save(&self, session_id: &str, user_id: &str, messages: &[ChatMessage]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table: Table = read_table(&self.path).await?;
        upsert(&mut table, session_id, user_id, messages);
        write_table(&self.path, &table).await?;
        info!(session_id = %session_id, messages = messages.len(), "🔖 会话记录已保存");
        Ok(())
    }

    async fn load(&self, session_id: &str, user_id: &str) -> Result<Vec<ChatMessage>> {
        let table: Table = read_table(&self.path).await?;
        Ok(table
            .get(&row_key(session_id, user_id))
            .map(|r| r.messages.clone())
            .unwrap_or_default())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let table: Table = read_table(&self.path).await?;
        Ok(sessions_of(&table, user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChefError, MemoryError};
    use crate::session::Role;

    fn turn(user: &str, assistant: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::User, user),
            ChatMessage::new(Role::Assistant, assistant),
        ]
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = FileTranscriptStore::new(&path).unwrap();
        store.save("s1", "u1", &turn("tacos?", "Yes!")).await.unwrap();
        drop(store);

        let reopened = FileTranscriptStore::new(&path).unwrap();
        let messages = reopened.load("s1", "u1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "tacos?");
    }

    #[tokio::test]
    async fn test_rows_scoped_by_user() {
        let store = InMemoryTranscriptStore::new();
        store.save("s1", "u1", &turn("a", "b")).await.unwrap();
        assert!(store.load("s1", "u2").await.unwrap().is_empty());
        assert_eq!(store.list_sessions("u1").await.unwrap().len(), 1);
        assert!(store.list_sessions("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_overwrites_row() {
        let store = InMemoryTranscriptStore::new();
        let mut messages = turn("a", "b");
        store.save("s1", "u1", &messages).await.unwrap();
        messages.extend(turn("c", "d"));
        store.save("s1", "u1", &messages).await.unwrap();

        assert_eq!(store.load("s1", "u1").await.unwrap().len(), 4);
        assert_eq!(store.list_sessions("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FileTranscriptStore::new(&path).unwrap();
        let err = store.load("s1", "u1").await.unwrap_err();
        assert!(matches!(err, ChefError::Memory(MemoryError::ReadFailed(_))));
    }
}
