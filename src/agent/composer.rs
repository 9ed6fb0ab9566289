use crate::llm::types::Message;
use crate::memory::facts::MemoryFact;
use crate::session::{ChatMessage, Role};

/// 一次模型调用的完整上下文
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub session_id: String,
    pub user_id: String,
    /// 已按发送顺序排好的消息
    pub messages: Vec<Message>,
}

/// 把人设、最近几轮历史、长期记忆和新消息拼成一次请求。
///
/// 消息顺序固定为：system 人设 → 历史（旧→新）→ 记忆块 → 新的 user 消息。
/// 超出 `history_turns` 的旧轮次直接丢弃，不做摘要，跨会话的信息靠记忆块补回。
pub struct TurnComposer {
    persona: String,
    history_turns: usize,
}

impl TurnComposer {
    pub fn new(persona: impl Into<String>, history_turns: usize) -> Self {
        Self {
            persona: persona.into(),
            history_turns,
        }
    }

    pub fn compose(
        &self,
        session_id: &str,
        user_id: &str,
        new_message: &str,
        transcript_tail: &[ChatMessage],
        memory_facts: &[MemoryFact],
    ) -> ModelRequest {
        let history = self.recent_turns(transcript_tail);
        let mut messages = Vec::with_capacity(history.len() + 3);

        messages.push(Message::system(self.persona.clone()));
        messages.extend(history.iter().map(|m| match m.role {
            Role::User => Message::user(m.content.clone()),
            Role::Assistant => Message::assistant(m.content.clone()),
        }));
        if let Some(block) = memory_block(memory_facts) {
            messages.push(Message::system(block));
        }
        messages.push(Message::user(new_message.to_string()));

        ModelRequest {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            messages,
        }
    }

    /// 以 user 消息为轮次起点切分，保留最近 `history_turns` 轮
    fn recent_turns<'a>(&self, transcript: &'a [ChatMessage]) -> &'a [ChatMessage] {
        if self.history_turns == 0 {
            return &[];
        }
        let mut seen = 0;
        for (idx, msg) in transcript.iter().enumerate().rev() {
            if msg.role == Role::User {
                seen += 1;
                if seen == self.history_turns {
                    return &transcript[idx..];
                }
            }
        }
        transcript
    }
}

fn memory_block(facts: &[MemoryFact]) -> Option<String> {
    if facts.is_empty() {
        return None;
    }
    let lines = facts
        .iter()
        .map(|f| format!("- {}", f.fact))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!(
        "You have the following memories about this user from previous conversations. \
         Use them to personalize your answer:\n{lines}"
    ))
}
