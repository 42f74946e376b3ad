use serde::{Deserialize, Serialize};

/// Upper bound on planner history, including the leading system entry.
pub const MAX_CONVERSATION_LEN: usize = 12;

const PLANNER_SYSTEM_PROMPT: &str = r#"You are a tool selector. The user will ask something; decide which tools to use (one or more) and return ONLY a JSON array, with no prose and no markdown, like:
[
  {"tool":"WebSearch","input":"bitcoin price today"},
  {"tool":"RunCode","input":"console.log(1+1)"},
  {"tool":"DelegateCall","input":"The question the user asked, along with any context needed to answer it"}
]
Available tools:
- WebSearch: search the web; input is the search query.
- RunCode: run JavaScript in an isolated sandbox; input is the script body, print results with console.log.
- DelegateCall: ask a language model directly; input must be self-sufficient because it is sent without this conversation.
Return [] when no tool is needed."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Running planner history for one session.
///
/// The first message is always the planner system prompt. Callers own the
/// state and hand it to the planner by `&mut`, so two sessions never share
/// memory unless the caller decides they should.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self::with_system_prompt(PLANNER_SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(prompt)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn enforce_limit(&mut self) {
        let kept = evict_oldest_exchanges(&self.messages, MAX_CONVERSATION_LEN);
        self.messages = kept;
    }
}

/// Drops the oldest user/assistant pair until `messages` fits in `limit`.
///
/// The leading system entry is never removed. When only the system entry
/// and a single trailing message remain, that message is dropped alone.
pub fn evict_oldest_exchanges(messages: &[ChatMessage], limit: usize) -> Vec<ChatMessage> {
    let mut kept = messages.to_vec();
    let limit = limit.max(1);
    while kept.len() > limit {
        let end = kept.len().min(3);
        kept.drain(1..end);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(state: &mut ConversationState, n: usize) {
        state.push_user(format!("question {n}"));
        state.push_assistant(format!("answer {n}"));
        state.enforce_limit();
    }

    #[test]
    fn starts_with_planner_prompt() {
        let state = ConversationState::new();
        assert_eq!(state.len(), 1);
        assert_eq!(state.messages()[0].role, Role::System);
        assert!(state.messages()[0].content.contains("tool selector"));
    }

    #[test]
    fn history_stays_bounded_and_keeps_system_entry() {
        let mut state = ConversationState::new();
        for n in 0..40 {
            exchange(&mut state, n);
            assert!(state.len() <= MAX_CONVERSATION_LEN);
            assert_eq!(state.messages()[0].role, Role::System);
        }
        let last = state.messages().last().unwrap();
        assert_eq!(last.content, "answer 39");
    }

    #[test]
    fn evicts_oldest_pair_first() {
        let mut state = ConversationState::new();
        for n in 0..6 {
            exchange(&mut state, n);
        }
        // 1 system + 12 entries -> oldest exchange dropped
        assert_eq!(state.len(), 11);
        assert_eq!(state.messages()[1].content, "question 1");
        assert_eq!(state.messages()[2].content, "answer 1");
    }

    #[test]
    fn eviction_is_pure() {
        let mut messages = vec![ChatMessage::system("sys")];
        for n in 0..14 {
            messages.push(ChatMessage::user(n.to_string()));
        }
        let kept = evict_oldest_exchanges(&messages, 12);
        assert_eq!(messages.len(), 15);
        assert_eq!(kept.len(), 11);
        assert_eq!(kept[0], ChatMessage::system("sys"));
        assert_eq!(kept[1].content, "4");
    }

    #[test]
    fn role_serializes_lowercase() {
        let value = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "assistant", "content": "hi"}));
    }
}
