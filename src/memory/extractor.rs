//! 长期记忆提取
//!
//! 每轮对话成功结束后，由 [`spawn_extraction`] 在后台调用 [`MemoryExtractor`]，
//! 把值得跨会话记住的用户事实合并进 [`FactStore`]。
//! 提取失败只记日志，永远不会影响用户看到的这一轮对话。

use crate::error::Result;
use crate::llm::LlmClient;
use crate::llm::types::Message;
use crate::memory::facts::FactStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a memory extraction assistant for a cooking assistant. From the exchange below, extract durable facts about the USER that would help personalize future recipe suggestions.

Rules:
1. Only include facts about the user: dietary restrictions, allergies, preferred cuisines, dislikes, skill level, kitchen equipment, household size, time constraints
2. Each fact must be one short, self-contained sentence
3. Do NOT include the recipes that were suggested or general cooking knowledge
4. Do NOT include greetings or one-off requests

Return ONLY a JSON array of strings, for example:
["User is vegetarian", "User has an air fryer"]

If there is nothing worth remembering, return []"#;

/// 一轮完整对话，作为提取输入
#[derive(Debug, Clone)]
pub struct CompletedTurn {
    pub user_id: String,
    pub session_id: String,
    pub user_text: String,
    pub assistant_text: String,
}

#[async_trait]
pub trait MemoryExtractor: Send + Sync {
    /// 从一轮对话中提取事实文本
    async fn extract(&self, turn: &CompletedTurn) -> Result<Vec<String>>;
}

/// 借助 LLM 判断哪些信息值得记住
pub struct LlmMemoryExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmMemoryExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl MemoryExtractor for LlmMemoryExtractor {
    async fn extract(&self, turn: &CompletedTurn) -> Result<Vec<String>> {
        let messages = vec![
            Message::system(EXTRACTION_SYSTEM_PROMPT.to_string()),
            Message::user(format!(
                "USER: {}\n\nASSISTANT: {}",
                turn.user_text, turn.assistant_text
            )),
        ];
        let raw = self.llm.chat_simple(messages, Some(0.0)).await?;
        Ok(parse_facts(&raw))
    }
}

/// 解析模型返回的 JSON 数组，兼容 ```json 代码块包裹；无法解析时返回空列表
pub fn parse_facts(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<Vec<String>>(body) {
        Ok(facts) => facts
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        Err(e) => {
            warn!(
                error = %e,
                content_preview = %body.chars().take(200).collect::<String>(),
                "记忆提取结果不是 JSON 数组，忽略"
            );
            Vec::new()
        }
    }
}

/// 后台执行提取并合并，返回句柄以便调用方在退出前等待
pub fn spawn_extraction(
    extractor: Arc<dyn MemoryExtractor>,
    store: Arc<dyn FactStore>,
    turn: CompletedTurn,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let facts = match extractor.extract(&turn).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(user_id = %turn.user_id, session_id = %turn.session_id, error = %e, "记忆提取失败");
                return;
            }
        };
        if facts.is_empty() {
            return;
        }
        match store
            .merge_facts(&turn.user_id, &turn.session_id, facts)
            .await
        {
            Ok(added) if added > 0 => {
                info!(user_id = %turn.user_id, added, "🧠 新增长期记忆")
            }
            Ok(_) => {}
            Err(e) => warn!(user_id = %turn.user_id, error = %e, "写入长期记忆失败"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::facts::InMemoryFactStore;
    use crate::testing::MockLlmClient;

    fn turn() -> CompletedTurn {
        CompletedTurn {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            user_text: "I'm vegan and only have a microwave".to_string(),
            assistant_text: "Here is a microwave mug chili...".to_string(),
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let facts = parse_facts("```json\n[\"User is vegan\", \" \"]\n```");
        assert_eq!(facts, vec!["User is vegan".to_string()]);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_facts("The user seems nice.").is_empty());
    }

    #[tokio::test]
    async fn test_llm_extractor_uses_zero_temperature_prompt() {
        let llm = Arc::new(
            MockLlmClient::new().with_response(r#"["User is vegan", "User only has a microwave"]"#),
        );
        let extractor = LlmMemoryExtractor::new(llm.clone());
        let facts = extractor.extract(&turn()).await.unwrap();
        assert_eq!(facts.len(), 2);

        let request = llm.last_request().unwrap();
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages[0].role, "system");
        assert!(
            request.messages[1]
                .content
                .as_deref()
                .unwrap()
                .contains("only have a microwave")
        );
    }

    #[tokio::test]
    async fn test_spawned_extraction_merges_facts() {
        let llm = Arc::new(MockLlmClient::new().with_response(r#"["User is vegan"]"#));
        let store = Arc::new(InMemoryFactStore::new());
        spawn_extraction(Arc::new(LlmMemoryExtractor::new(llm)), store.clone(), turn())
            .await
            .unwrap();
        let facts = store.facts_for_user("u1").await.unwrap();
        assert_eq!(facts[0].fact, "User is vegan");
    }

    #[tokio::test]
    async fn test_spawned_extraction_failure_is_swallowed() {
        let llm = Arc::new(MockLlmClient::new().with_network_error("connection reset"));
        let store = Arc::new(InMemoryFactStore::new());
        let handle =
            spawn_extraction(Arc::new(LlmMemoryExtractor::new(llm)), store.clone(), turn());
        assert!(handle.await.is_ok());
        assert!(store.facts_for_user("u1").await.unwrap().is_empty());
    }
}
