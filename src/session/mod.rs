//! 会话控制器
//!
//! 持有当前进程内活动会话的身份（`session_id` / `user_id`）与只追加的对话记录。
//! 所有方法都是同步的内存操作，只会在单条顺序执行的对话路径上调用，因此无需加锁。
//!
//! ```rust
//! use chef_agent::session::{Role, SessionController};
//!
//! let mut session = SessionController::new("alice");
//! session.append(Role::User, "What can I make with leeks?");
//! session.append(Role::Assistant, "Try a potato and leek soup.");
//! assert_eq!(session.turn_count(), 1);
//! assert_eq!(session.export().lines().count(), 2);
//! ```

mod id;

pub use id::SessionIdGenerator;

use crate::memory::transcript::TranscriptStore;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// 空记录时 `export()` 返回的固定文本
pub const NO_HISTORY: &str = "No chat history to export.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对话记录中的一条消息，时间戳在追加时由控制器写入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Markdown 文本
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }

    /// `[YYYY-MM-DD HH:MM:SS] ROLE: content`，内容中的换行转义为 `\n` 以保持单行
    pub fn export_line(&self) -> String {
        let content = self.content.replace("\r\n", "\\n").replace('\n', "\\n");
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.role.as_str().to_uppercase(),
            content
        )
    }
}

pub struct SessionController {
    session_id: String,
    user_id: String,
    transcript: Vec<ChatMessage>,
}

impl SessionController {
    /// 为 `user_id` 创建控制器并立即开启一个新会话
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            session_id: id::SESSION_IDS.next(),
            user_id: user_id.into(),
            transcript: Vec::new(),
        }
    }

    /// 开启新会话：生成新 id 并清空对话记录
    pub fn create_session(&mut self, user_id: impl Into<String>) -> String {
        self.user_id = user_id.into();
        self.session_id = id::SESSION_IDS.next();
        self.transcript.clear();
        info!(session_id = %self.session_id, user_id = %self.user_id, "🆕 新会话");
        self.session_id.clone()
    }

    /// 清空记录并切换到新的 session_id，返回新 id
    pub fn reset(&mut self) -> String {
        let user_id = self.user_id.clone();
        self.create_session(user_id)
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.transcript.push(ChatMessage::new(role, content));
    }

    /// 以持久化的历史替换内存中的记录（显式恢复旧会话）
    pub fn resume(&mut self, session_id: impl Into<String>, messages: Vec<ChatMessage>) {
        self.session_id = session_id.into();
        self.transcript = messages;
        info!(
            session_id = %self.session_id,
            messages = self.transcript.len(),
            "♻️ 恢复会话"
        );
    }

    pub fn export(&self) -> String {
        if self.transcript.is_empty() {
            return NO_HISTORY.to_string();
        }
        self.transcript
            .iter()
            .map(ChatMessage::export_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 导出文件名，带上当前 session_id
    pub fn export_file_name(&self) -> String {
        format!("chef_chat_{}.txt", self.session_id)
    }

    /// 从持久化存储读取某会话的历史。
    ///
    /// 读取失败时记录告警并返回空历史，界面表现为一段新对话。
    pub async fn load_history(
        store: &dyn TranscriptStore,
        session_id: &str,
        user_id: &str,
    ) -> Vec<ChatMessage> {
        match store.load(session_id, user_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    user_id = %user_id,
                    error = %e,
                    "读取会话历史失败，按空历史处理"
                );
                Vec::new()
            }
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// 已完成的问答轮数
    pub fn turn_count(&self) -> usize {
        self.transcript.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::transcript::InMemoryTranscriptStore;
    use crate::testing::FailingTranscriptStore;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_reset_clears_and_changes_id() {
        let mut session = SessionController::new("u1");
        session.append(Role::User, "hi");
        session.append(Role::Assistant, "hello");
        let before = session.session_id().to_string();

        let after = session.reset();
        assert!(session.is_empty());
        assert_ne!(before, after);
        assert_eq!(session.session_id(), after);

        // 再次 reset 依旧得到空记录和新 id
        let again = session.reset();
        assert!(session.is_empty());
        assert_ne!(after, again);
        assert_eq!(session.user_id(), "u1");
    }

    #[test]
    fn test_export_empty_sentinel() {
        let session = SessionController::new("u1");
        assert_eq!(session.export(), NO_HISTORY);
    }

    #[test]
    fn test_export_line_per_message() {
        let mut session = SessionController::new("u1");
        session.append(Role::User, "I have eggs");
        session.append(Role::Assistant, "## Shakshuka\n\n1. Heat oil\n2. Add tomatoes");
        session.append(Role::User, "thanks");

        let exported = session.export();
        let lines: Vec<&str> = exported.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("USER: I have eggs"));
        assert!(lines[1].contains("ASSISTANT: ## Shakshuka\\n\\n1. Heat oil"));
    }

    #[test]
    fn test_export_uses_message_timestamp() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: "Enjoy!".to_string(),
            timestamp: Local.with_ymd_and_hms(2025, 3, 4, 18, 30, 5).unwrap(),
        };
        assert_eq!(msg.export_line(), "[2025-03-04 18:30:05] ASSISTANT: Enjoy!");
    }

    #[test]
    fn test_export_file_name() {
        let session = SessionController::new("u1");
        assert_eq!(
            session.export_file_name(),
            format!("chef_chat_{}.txt", session.session_id())
        );
    }

    /// 收集 fmt 订阅者输出的日志文本
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_load_history_fail_soft() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let history = SessionController::load_history(&InMemoryTranscriptStore::new(), "s1", "u1").await;
        assert!(history.is_empty());
        assert!(logs.text().is_empty());

        let history = SessionController::load_history(&FailingTranscriptStore, "s1", "u1").await;
        assert!(history.is_empty());
        let text = logs.text();
        assert!(text.contains("WARN"));
        assert!(text.contains("读取会话历史失败"));
        assert!(text.contains("session_id=s1"));
        assert!(text.contains("user_id=u1"));
        assert!(text.contains("database is locked"));
    }

    #[tokio::test]
    async fn test_load_history_and_resume() {
        let store = InMemoryTranscriptStore::new();
        let messages = vec![
            ChatMessage::new(Role::User, "soup ideas?"),
            ChatMessage::new(Role::Assistant, "Minestrone."),
        ];
        store.save("s1", "u1", &messages).await.unwrap();

        let history = SessionController::load_history(&store, "s1", "u1").await;
        let mut session = SessionController::new("u1");
        session.resume("s1", history);
        assert_eq!(session.session_id(), "s1");
        assert_eq!(session.messages(), messages.as_slice());
    }
}
