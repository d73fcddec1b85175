//! Chat message types shared by the panel controller, the endpoint client
//! and the record store.

use serde::{Deserialize, Serialize};

/// Label used in cache keys when nobody is signed in.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Session-storage key holding the panel's open/closed flag.
pub const OPEN_STATE_KEY: &str = "ai_chat_isOpen";

const DRAFT_KEY_PREFIX: &str = "chat_messages_new_";
const ENTRY_KEY_PREFIX: &str = "chat_messages_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// A single chat bubble. Insertion order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Who is chatting, and about which journal entry.
///
/// Blank identifiers are treated as absent so a host passing `""` for a
/// draft behaves the same as passing nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationKey {
    pub user_id: Option<String>,
    pub entry_id: Option<String>,
}

impl ConversationKey {
    pub fn new(user_id: Option<String>, entry_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|v| !v.trim().is_empty()),
            entry_id: entry_id.filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_label(&self) -> &str {
        self.user_id.as_deref().unwrap_or(ANONYMOUS_USER)
    }

    /// `chat_messages_new_<userId|anonymous>`
    pub fn draft_cache_key(&self) -> String {
        format!("{}{}", DRAFT_KEY_PREFIX, self.user_label())
    }

    pub fn anonymous_draft_key() -> String {
        format!("{}{}", DRAFT_KEY_PREFIX, ANONYMOUS_USER)
    }

    /// Cache key for the active conversation: the entry's key once it has
    /// an identifier, otherwise the per-user draft key.
    pub fn cache_key(&self) -> String {
        match &self.entry_id {
            Some(entry_id) => format!("{}{}", ENTRY_KEY_PREFIX, entry_id),
            None => self.draft_cache_key(),
        }
    }
}

pub fn encode_messages(messages: &[ChatMessage]) -> serde_json::Result<String> {
    serde_json::to_string(messages)
}

pub fn decode_messages(raw: &str) -> serde_json::Result<Vec<ChatMessage>> {
    serde_json::from_str(raw)
}

/// Failure talking to the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP error! status: {0}")]
    Status(u16),
    /// The endpoint answered 2xx but reported an error in its payload
    #[error("{0}")]
    Remote(String),
    #[error("{0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        let anon = ConversationKey::anonymous();
        assert_eq!(anon.cache_key(), "chat_messages_new_anonymous");
        assert_eq!(anon.draft_cache_key(), ConversationKey::anonymous_draft_key());

        let draft = ConversationKey::new(Some("u1".into()), None);
        assert_eq!(draft.cache_key(), "chat_messages_new_u1");

        let saved = ConversationKey::new(Some("u1".into()), Some("e9".into()));
        assert_eq!(saved.cache_key(), "chat_messages_e9");
        assert_eq!(saved.draft_cache_key(), "chat_messages_new_u1");
    }

    #[test]
    fn test_blank_identifiers_are_absent() {
        let key = ConversationKey::new(Some("".into()), Some("  ".into()));
        assert_eq!(key, ConversationKey::anonymous());
    }

    #[test]
    fn test_wire_format() {
        let json = encode_messages(&[ChatMessage::user("hi"), ChatMessage::assistant("hello")])
            .unwrap();
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#
        );
        assert!(decode_messages(r#"[{"role":"system","content":"x"}]"#).is_err());
    }

    #[test]
    fn test_status_error_text() {
        assert_eq!(ChatError::Status(500).to_string(), "HTTP error! status: 500");
        assert_eq!(ChatError::Remote("quota".into()).to_string(), "quota");
    }
}
