//! Conversation message types.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assistant::FileAttachment;
use super::plan::Plan;
use super::run::Run;

/// Client-local correlation key, assigned the moment a message is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey(Uuid);

impl MessageKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message in the conversation list.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    User(UserMessage),
    Assistant(AssistantMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub key: MessageKey,
    pub server_id: Option<String>,
    pub content: String,
    pub attachments: Vec<FileAttachment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub key: MessageKey,
    pub server_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// True while the run producing this message is still streaming.
    pub pending: bool,
    pub run_id: Option<String>,
    pub plan: Plan,
    pub error: Option<MessageError>,
    /// Run record fetched on demand for detail views.
    pub run_detail: Option<Run>,
}

/// Kind of failure attached to an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageErrorKind {
    Network,
    RunFailed,
    Protocol,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageError {
    pub kind: MessageErrorKind,
    pub message: String,
}

impl UserMessage {
    pub fn new(content: impl Into<String>, attachments: Vec<FileAttachment>) -> Self {
        Self {
            key: MessageKey::new(),
            server_id: None,
            content: content.into(),
            attachments,
            created_at: Utc::now(),
        }
    }
}

impl AssistantMessage {
    /// A pending placeholder that will receive streamed content.
    pub fn placeholder() -> Self {
        Self {
            key: MessageKey::new(),
            server_id: None,
            content: String::new(),
            created_at: Utc::now(),
            pending: true,
            run_id: None,
            plan: Plan::default(),
            error: None,
            run_detail: None,
        }
    }

    /// Nothing the user could be reading: no text, no steps, no error.
    pub fn is_blank(&self) -> bool {
        self.content.is_empty() && self.plan.is_empty() && self.error.is_none()
    }
}

impl ChatMessage {
    pub fn key(&self) -> MessageKey {
        match self {
            Self::User(m) => m.key,
            Self::Assistant(m) => m.key,
        }
    }

    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::User(m) => m.server_id.as_deref(),
            Self::Assistant(m) => m.server_id.as_deref(),
        }
    }

    pub fn set_server_id(&mut self, id: impl Into<String>) {
        let id = Some(id.into());
        match self {
            Self::User(m) => m.server_id = id,
            Self::Assistant(m) => m.server_id = id,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User(m) => &m.content,
            Self::Assistant(m) => &m.content,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::User(m) => m.created_at,
            Self::Assistant(m) => m.created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        match self {
            Self::User(_) => false,
            Self::Assistant(m) => m.pending,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Self::Assistant(m) => Some(m),
            Self::User(_) => None,
        }
    }

    pub fn as_assistant_mut(&mut self) -> Option<&mut AssistantMessage> {
        match self {
            Self::Assistant(m) => Some(m),
            Self::User(_) => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserMessage> {
        match self {
            Self::User(m) => Some(m),
            Self::Assistant(_) => None,
        }
    }
}

/// Role of a persisted message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Text content block as stored and streamed by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: TextValue },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextValue {
    pub value: String,
}

/// Concatenate the text segments of a block list.
pub fn blocks_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.value.as_str()),
            ContentBlock::Unsupported => None,
        })
        .collect()
}

/// A message as returned by the message persistence endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
    #[serde(default)]
    pub run_id: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl MessageRecord {
    pub fn text(&self) -> String {
        blocks_text(&self.content)
    }

    /// Convert a persisted record into a settled list entry.
    pub fn into_chat_message(self) -> ChatMessage {
        let created_at = self
            .created_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        let content = self.text();
        match self.role {
            MessageRole::User => ChatMessage::User(UserMessage {
                key: MessageKey::new(),
                server_id: Some(self.id),
                content,
                attachments: self.attachments,
                created_at,
            }),
            MessageRole::Assistant => ChatMessage::Assistant(AssistantMessage {
                key: MessageKey::new(),
                server_id: Some(self.id),
                content,
                created_at,
                pending: false,
                run_id: self.run_id,
                plan: Plan {
                    steps: Vec::new(),
                    pending: false,
                },
                error: None,
                run_detail: None,
            }),
        }
    }
}
