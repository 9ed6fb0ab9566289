//! 长期记忆（用户事实）存储
//!
//! 事实只按 `user_id` 归档，与产生它的会话无关，因此在任何会话中都能取回。
//! 只由 [`MemoryExtractor`](crate::memory::extractor::MemoryExtractor) 写入，从不自动删除。

use crate::error::Result;
use crate::memory::file::{prepare_path, read_table, write_table};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryFact {
    /// UUID v4
    pub id: String,
    pub user_id: String,
    pub fact: String,
    /// 提取出该事实的会话
    pub source_session_id: String,
    pub created_at: DateTime<Local>,
}

impl MemoryFact {
    pub fn new(
        user_id: impl Into<String>,
        source_session_id: impl Into<String>,
        fact: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            fact: fact.into(),
            source_session_id: source_session_id.into(),
            created_at: Local::now(),
        }
    }
}

/// 用户事实存储接口
#[async_trait]
pub trait FactStore: Send + Sync {
    /// 写入或覆盖一条事实（按 `id`）
    async fn upsert(&self, fact: MemoryFact) -> Result<()>;

    /// 某用户的全部事实，按创建时间升序
    async fn facts_for_user(&self, user_id: &str) -> Result<Vec<MemoryFact>>;

    /// 合并一批新事实，跳过与已有事实重复（忽略大小写与首尾空白）的条目，返回实际新增数。
    ///
    /// 默认实现分步读写，不保证并发合并时去重；内置存储都在各自的写锁内整体完成。
    async fn merge_facts(&self, user_id: &str, session_id: &str, facts: Vec<String>) -> Result<usize> {
        let mut known: Vec<String> = self
            .facts_for_user(user_id)
            .await?
            .into_iter()
            .map(|f| normalize(&f.fact))
            .collect();
        let mut added = 0;
        for fact in facts {
            let key = normalize(&fact);
            if key.is_empty() || known.contains(&key) {
                continue;
            }
            self.upsert(MemoryFact::new(user_id, session_id, fact.trim())).await?;
            known.push(key);
            added += 1;
        }
        Ok(added)
    }
}

fn normalize(fact: &str) -> String {
    fact.trim().to_lowercase()
}

/// 在已持有写锁的表上去重合并，返回新增数
fn merge_into(table: &mut Table, user_id: &str, session_id: &str, facts: Vec<String>) -> usize {
    let mut known: Vec<String> = table
        .get(user_id)
        .map(|b| b.values().map(|f| normalize(&f.fact)).collect())
        .unwrap_or_default();
    let mut added = 0;
    for fact in facts {
        let key = normalize(&fact);
        if key.is_empty() || known.contains(&key) {
            continue;
        }
        insert(table, MemoryFact::new(user_id, session_id, fact.trim()));
        known.push(key);
        added += 1;
    }
    debug!(user_id = %user_id, added, "🧠 合并记忆");
    added
}

/// user_id → (fact id → fact)
type Table = HashMap<String, HashMap<String, MemoryFact>>;

fn insert(table: &mut Table, fact: MemoryFact) {
    table
        .entry(fact.user_id.clone())
        .or_default()
        .insert(fact.id.clone(), fact);
}

fn facts_of(table: &Table, user_id: &str) -> Vec<MemoryFact> {
    let mut facts: Vec<MemoryFact> = table
        .get(user_id)
        .map(|b| b.values().cloned().collect())
        .unwrap_or_default();
    facts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    facts
}

// ── InMemoryFactStore ─────────────────────────────────────────────────────────

pub struct InMemoryFactStore {
    data: RwLock<Table>,
}

impl Default for InMemoryFactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn upsert(&self, fact: MemoryFact) -> Result<()> {
        insert(&mut *self.data.write().await, fact);
        Ok(())
    }

    async fn facts_for_user(&self, user_id: &str) -> Result<Vec<MemoryFact>> {
        Ok(facts_of(&*self.data.read().await, user_id))
    }

    async fn merge_facts(&self, user_id: &str, session_id: &str, facts: Vec<String>) -> Result<usize> {
        Ok(merge_into(&mut *self.data.write().await, user_id, session_id, facts))
    }
}

// ── FileFactStore ─────────────────────────────────────────────────────────────

/// 基于 JSON 文件的用户事实存储，读写方式与 [`FileTranscriptStore`](crate::memory::transcript::FileTranscriptStore) 相同
pub struct FileFactStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileFactStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = prepare_path(path.as_ref())?;
        info!(path = %path.display(), "🗄️ FileFactStore 初始化");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl FactStore for FileFactStore {
    async fn upsert(&self, fact: MemoryFact) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut table: Table = read_table(&self.path).await?;
        insert(&mut table, fact);
        write_table(&self.path, &table).await
    }

    async fn facts_for_user(&self, user_id: &str) -> Result<Vec<MemoryFact>> {
        let table: Table = read_table(&self.path).await?;
        Ok(facts_of(&table, user_id))
    }

    async fn merge_facts(&self, user_id: &str, session_id: &str, facts: Vec<String>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut table: Table = read_table(&self.path).await?;
        let added = merge_into(&mut table, user_id, session_id, facts);
        if added > 0 {
            write_table(&self.path, &table).await?;
        }
        Ok(added)
    }
}
