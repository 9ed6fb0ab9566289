//! 对外暴露的对话入口
//!
//! [`ChefAssistant`] 持有会话控制器、上下文组装器、模型调用器与各存储，
//! 向展示层只提供三个操作：[`submit`](ChefAssistant::submit)、
//! [`reset`](ChefAssistant::reset)、[`export`](ChefAssistant::export)。
//!
//! 一轮对话无论成功与否，都会在记录中恰好追加一条 user 消息和一条 assistant 消息；
//! 模型调用失败时，assistant 消息的内容就是错误说明。

use crate::agent::persona;
use crate::agent::{InvokerConfig, ModelInvoker, TurnComposer};
use crate::config::{AppConfig, Credentials};
use crate::error::{InvocationError, Result};
use crate::llm::HttpLlmClient;
use crate::llm::LlmClient;
use crate::llm::config::ModelConfig;
use crate::memory::extractor::{CompletedTurn, LlmMemoryExtractor, MemoryExtractor, spawn_extraction};
use crate::memory::facts::{FactStore, FileFactStore, MemoryFact};
use crate::memory::transcript::{FileTranscriptStore, SessionRecord, TranscriptStore};
use crate::session::{ChatMessage, Role, SessionController};
use crate::tools::ToolManager;
use crate::tools::search::{ExaSearch, SearchProvider, SearchRecipesTool};
use chrono::Local;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 一轮对话的结果：写入记录的 assistant 文本，以及失败时的错误
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub error: Option<InvocationError>,
    pub used_tools: bool,
}

impl TurnOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// 展示层的会话信息面板
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    pub message_count: usize,
    pub memory_enabled: bool,
}

pub struct ChefAssistant {
    session: SessionController,
    composer: TurnComposer,
    invoker: ModelInvoker,
    transcripts: Arc<dyn TranscriptStore>,
    facts: Arc<dyn FactStore>,
    /// `None` 表示关闭长期记忆（既不提取也不注入）
    extractor: Option<Arc<dyn MemoryExtractor>>,
    pending_extractions: Vec<JoinHandle<()>>,
}

impl ChefAssistant {
    pub fn new(
        user_id: impl Into<String>,
        composer: TurnComposer,
        invoker: ModelInvoker,
        transcripts: Arc<dyn TranscriptStore>,
        facts: Arc<dyn FactStore>,
    ) -> Self {
        Self {
            session: SessionController::new(user_id),
            composer,
            invoker,
            transcripts,
            facts,
            extractor: None,
            pending_extractions: Vec::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MemoryExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// 按配置装配真实依赖：HTTP 模型客户端、Exa 搜索、JSON 文件存储。
    ///
    /// 需要先拿到 [`Credentials`]，因此凭据缺失会在任何模型调用之前暴露。
    pub fn from_config(config: &AppConfig, credentials: &Credentials) -> Result<Self> {
        config.validate()?;
        let http = Arc::new(
            Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .map_err(InvocationError::from)?,
        );
        let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
            http.clone(),
            ModelConfig::from_app(config, credentials),
        )?);
        let search: Arc<dyn SearchProvider> = Arc::new(ExaSearch::new(
            http,
            config.search_url.clone(),
            credentials.search_api_key.clone(),
        ));

        let mut tools = ToolManager::new();
        tools.register(Box::new(SearchRecipesTool::new(search, config.search_results)));

        let composer = TurnComposer::new(
            persona::chef_genius(Some(Local::now())),
            config.history_turns,
        );
        let invoker = ModelInvoker::new(
            llm.clone(),
            tools,
            InvokerConfig {
                request_timeout: Duration::from_secs(config.request_timeout_secs),
                max_retries: config.max_retries,
                retry_delay: Duration::from_millis(config.retry_delay_ms),
                max_tool_rounds: config.max_tool_rounds,
            },
        );

        let assistant = Self::new(
            config.user_id.clone(),
            composer,
            invoker,
            Arc::new(FileTranscriptStore::new(&config.sessions_path)?),
            Arc::new(FileFactStore::new(&config.memory_path)?),
        );
        info!(model = %config.model, user_id = %config.user_id, "🍳 {} 已就绪", persona::AGENT_NAME);

        Ok(if config.enable_memory {
            assistant.with_extractor(Arc::new(LlmMemoryExtractor::new(llm)))
        } else {
            assistant
        })
    }

    /// 处理一轮对话。永不返回错误：模型失败会变成一条 assistant 错误消息。
    pub async fn submit(&mut self, text: &str) -> TurnOutcome {
        let session_id = self.session.session_id().to_string();
        let user_id = self.session.user_id().to_string();

        let facts = self.load_facts(&user_id).await;
        let request = self.composer.compose(
            &session_id,
            &user_id,
            text,
            self.session.messages(),
            &facts,
        );
        self.session.append(Role::User, text);

        let outcome = match self.invoker.invoke(&request).await {
            Ok(reply) => TurnOutcome {
                reply: reply.content,
                error: None,
                used_tools: reply.used_tools,
            },
            Err(e) => {
                match &e {
                    InvocationError::Transient(_) => {
                        warn!(session_id = %session_id, error = %e, "本轮模型调用失败（可重试）")
                    }
                    _ => error!(session_id = %session_id, error = %e, "本轮模型调用失败"),
                }
                TurnOutcome {
                    reply: e.user_message(),
                    error: Some(e),
                    used_tools: false,
                }
            }
        };
        self.session.append(Role::Assistant, outcome.reply.clone());

        if let Err(e) = self
            .transcripts
            .save(&session_id, &user_id, self.session.messages())
            .await
        {
            warn!(session_id = %session_id, error = %e, "会话记录保存失败");
        }

        if outcome.is_ok()
            && let Some(extractor) = &self.extractor
        {
            self.pending_extractions.retain(|h| !h.is_finished());
            self.pending_extractions.push(spawn_extraction(
                extractor.clone(),
                self.facts.clone(),
                CompletedTurn {
                    user_id,
                    session_id,
                    user_text: text.to_string(),
                    assistant_text: outcome.reply.clone(),
                },
            ));
        }

        outcome
    }

    /// 开启新会话，返回新的 session_id
    pub fn reset(&mut self) -> String {
        self.session.reset()
    }

    pub fn export(&self) -> String {
        self.session.export()
    }

    pub fn export_file_name(&self) -> String {
        self.session.export_file_name()
    }

    /// 从持久化存储恢复某个旧会话；读取失败时得到一段空对话
    pub async fn resume(&mut self, session_id: &str) -> usize {
        let history = SessionController::load_history(
            self.transcripts.as_ref(),
            session_id,
            self.session.user_id(),
        )
        .await;
        let count = history.len();
        self.session.resume(session_id, history);
        count
    }

    /// 当前用户的历史会话，读取失败时返回空列表
    pub async fn sessions(&self) -> Vec<SessionRecord> {
        self.transcripts
            .list_sessions(self.session.user_id())
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = %self.session.user_id(), error = %e, "读取会话列表失败");
                Vec::new()
            })
    }

    /// 当前用户的全部长期记忆
    pub async fn memories(&self) -> Vec<MemoryFact> {
        self.load_facts(self.session.user_id()).await
    }

    /// 等待尚未结束的后台记忆提取
    pub async fn wait_for_memory(&mut self) {
        for handle in self.pending_extractions.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "记忆提取任务异常退出");
            }
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session.session_id().to_string(),
            user_id: self.session.user_id().to_string(),
            message_count: self.session.len(),
            memory_enabled: self.extractor.is_some(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.session.messages()
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    async fn load_facts(&self, user_id: &str) -> Vec<MemoryFact> {
        if self.extractor.is_none() {
            return Vec::new();
        }
        self.facts.facts_for_user(user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "读取长期记忆失败，本轮不注入记忆");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MODEL_KEY_ENV, SEARCH_KEY_ENV};
    use crate::error::{ChefError, ConfigError};
    use crate::memory::facts::InMemoryFactStore;
    use crate::memory::transcript::InMemoryTranscriptStore;
    use crate::session::NO_HISTORY;
    use crate::testing::{FailingFactStore, FailingTranscriptStore, MockLlmClient, MockSearch};

    struct Harness {
        llm: Arc<MockLlmClient>,
        transcripts: Arc<InMemoryTranscriptStore>,
        facts: Arc<InMemoryFactStore>,
    }

    impl Harness {
        fn new(llm: MockLlmClient) -> Self {
            Self {
                llm: Arc::new(llm),
                transcripts: Arc::new(InMemoryTranscriptStore::new()),
                facts: Arc::new(InMemoryFactStore::new()),
            }
        }

        fn assistant(&self, user_id: &str) -> ChefAssistant {
            let mut tools = ToolManager::new();
            tools.register(Box::new(SearchRecipesTool::new(Arc::new(MockSearch::new()), 3)));
            let invoker = ModelInvoker::new(
                self.llm.clone(),
                tools,
                InvokerConfig {
                    request_timeout: Duration::from_secs(5),
                    max_retries: 0,
                    retry_delay: Duration::from_millis(1),
                    max_tool_rounds: 3,
                },
            );
            ChefAssistant::new(
                user_id,
                TurnComposer::new(persona::chef_genius(None), 5),
                invoker,
                self.transcripts.clone(),
                self.facts.clone(),
            )
        }
    }

    fn assert_alternating(messages: &[ChatMessage]) {
        for (i, m) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(m.role, expected, "message {i} has the wrong role");
        }
    }

    #[tokio::test]
    async fn test_first_turn_scenario() {
        let h = Harness::new(MockLlmClient::new().with_response("## Chicken & Broccoli Fried Rice"));
        let mut assistant = h.assistant("u1");

        let outcome = assistant
            .submit("I have chicken, rice, and broccoli — what can I make?")
            .await;
        assert!(outcome.is_ok());
        assert_eq!(assistant.messages().len(), 2);

        let request = h.llm.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert!(
            request.messages[0]
                .content
                .as_deref()
                .unwrap()
                .starts_with("You are ChefGenius")
        );

        let saved = h
            .transcripts
            .load(assistant.session_id(), "u1")
            .await
            .unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[tokio::test]
    async fn test_n_turns_give_2n_alternating_messages() {
        let h = Harness::new(MockLlmClient::new().with_responses(["one", "two", "three", "four"]));
        let mut assistant = h.assistant("u1");
        for q in ["a", "b", "c", "d"] {
            assert!(assistant.submit(q).await.is_ok());
        }
        assert_eq!(assistant.messages().len(), 8);
        assert_alternating(assistant.messages());
        assert_eq!(assistant.messages()[7].content, "four");
    }

    #[tokio::test]
    async fn test_transient_error_appends_exactly_one_reply() {
        let h = Harness::new(MockLlmClient::new().with_network_error("connection reset"));
        let mut assistant = h.assistant("u1");

        let outcome = assistant.submit("pancakes?").await;
        assert!(matches!(outcome.error, Some(InvocationError::Transient(_))));
        assert_eq!(assistant.messages().len(), 2);
        assert_eq!(assistant.messages()[1].role, Role::Assistant);
        assert_eq!(assistant.messages()[1].content, outcome.reply);
        assert!(outcome.reply.contains("try sending that again"));
    }

    #[tokio::test]
    async fn test_session_usable_after_remote_error() {
        let h = Harness::new(
            MockLlmClient::new()
                .with_error(InvocationError::Remote("content policy".to_string()))
                .with_response("Here's a safe recipe."),
        );
        let mut assistant = h.assistant("u1");
        let first = assistant.submit("something").await;
        assert_eq!(first.reply, "Sorry, I encountered an error: content policy");

        let second = assistant.submit("something else").await;
        assert!(second.is_ok());
        assert_eq!(assistant.messages().len(), 4);
        assert_alternating(assistant.messages());
    }

    #[tokio::test]
    async fn test_memory_crosses_sessions() {
        let h = Harness::new(
            MockLlmClient::new()
                .with_response("Noted, here's a tofu stir-fry.")
                .with_response(r#"["User is vegetarian"]"#)
                .with_response("How about a veggie lasagna?"),
        );
        let mut assistant = h.assistant("u1").with_extractor(Arc::new(
            LlmMemoryExtractor::new(h.llm.clone()),
        ));

        assistant.submit("I'm vegetarian, dinner ideas?").await;
        assistant.wait_for_memory().await;
        let first_session = assistant.session_id().to_string();

        let second_session = assistant.reset();
        assert_ne!(first_session, second_session);
        assistant.submit("What about lunch?").await;

        let request = h.llm.last_request().unwrap();
        let memory_msg = request
            .messages
            .iter()
            .find(|m| {
                m.role == "system"
                    && m.content.as_deref().unwrap_or("").contains("User is vegetarian")
            })
            .expect("memory block missing");
        assert!(memory_msg.content.is_some());
        // 新会话没有历史：persona + 记忆 + 新消息
        assert_eq!(request.messages.len(), 3);

        let facts = assistant.memories().await;
        assert_eq!(facts[0].source_session_id, first_session);
    }

    #[tokio::test]
    async fn test_memory_disabled_injects_nothing() {
        let h = Harness::new(MockLlmClient::new().with_response("ok"));
        h.facts
            .merge_facts("u1", "s0", vec!["User is vegetarian".to_string()])
            .await
            .unwrap();
        let mut assistant = h.assistant("u1");
        assistant.submit("hi").await;
        assert_eq!(h.llm.last_request().unwrap().messages.len(), 2);
        assert!(!assistant.info().memory_enabled);
    }

    #[tokio::test]
    async fn test_extractor_failure_does_not_affect_turn() {
        let h = Harness::new(MockLlmClient::new().with_response("Soup!"));
        let failing_llm = Arc::new(MockLlmClient::new().with_network_error("down"));
        let mut assistant = h
            .assistant("u1")
            .with_extractor(Arc::new(LlmMemoryExtractor::new(failing_llm)));

        let outcome = assistant.submit("cold day recipe?").await;
        assistant.wait_for_memory().await;
        assert!(outcome.is_ok());
        assert_eq!(assistant.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let llm = Arc::new(MockLlmClient::new().with_response("Omelette."));
        let invoker = ModelInvoker::new(llm, ToolManager::new(), InvokerConfig::default());
        let mut assistant = ChefAssistant::new(
            "u1",
            TurnComposer::new("persona", 5),
            invoker,
            Arc::new(FailingTranscriptStore),
            Arc::new(FailingFactStore),
        )
        .with_extractor(Arc::new(LlmMemoryExtractor::new(Arc::new(
            MockLlmClient::new(),
        ))));

        let outcome = assistant.submit("eggs?").await;
        assert!(outcome.is_ok());
        assert_eq!(assistant.resume("session_old").await, 0);
        assert!(assistant.messages().is_empty());
        assert!(assistant.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_and_export() {
        let h = Harness::new(MockLlmClient::new().with_response("Risotto."));
        let mut assistant = h.assistant("u1");
        assert_eq!(assistant.export(), NO_HISTORY);

        assistant.submit("rice ideas").await;
        assert_eq!(assistant.export().lines().count(), 2);
        assert!(
            assistant
                .export_file_name()
                .starts_with("chef_chat_session_")
        );

        let old = assistant.session_id().to_string();
        let new = assistant.reset();
        assert_ne!(old, new);
        assert_eq!(assistant.export(), NO_HISTORY);
        assert_eq!(assistant.info().message_count, 0);
    }

    #[tokio::test]
    async fn test_resume_previous_session() {
        let h = Harness::new(MockLlmClient::new().with_responses(["Gnocchi.", "Use sage butter."]));
        let mut first = h.assistant("u1");
        first.submit("potato dinner?").await;
        let old_session = first.session_id().to_string();

        let mut second = h.assistant("u1");
        assert_eq!(second.resume(&old_session).await, 2);
        second.submit("which sauce?").await;

        let request = h.llm.last_request().unwrap();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(second.messages().len(), 4);
        assert_eq!(second.sessions().await.len(), 1);
    }

    #[test]
    fn test_missing_credential_blocks_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            sessions_path: dir.path().join("state/sessions.json").display().to_string(),
            memory_path: dir.path().join("state/memory.json").display().to_string(),
            ..AppConfig::default()
        };

        let result = Credentials::from_lookup(|k| (k == MODEL_KEY_ENV).then(|| "g-key".to_string()))
            .and_then(|credentials| ChefAssistant::from_config(&config, &credentials));
        match result {
            Err(ChefError::Config(ConfigError::MissingCredential(key))) => {
                assert_eq!(key, SEARCH_KEY_ENV)
            }
            Err(other) => panic!("expected missing credential, got {other}"),
            Ok(_) => panic!("assistant built without a search key"),
        }
        // 启动在装配任何存储之前就已中止
        assert!(!dir.path().join("state").exists());
    }
}
