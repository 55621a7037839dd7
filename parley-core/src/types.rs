//! Core data model: roles, messages, conversation state.

use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System context message
    System,
    /// User message
    User,
    /// Assistant (AI) response
    Assistant,
}

impl Role {
    /// Convert to string representation for wire use.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "system" => Self::System,
            "assistant" => Self::Assistant,
            _ => Self::User, // Default fallback
        }
    }
}

/// A single conversation message.
///
/// A message starts ephemeral (`id` unset, existing only in memory) and
/// gains its identity at reconciliation time. Once assigned, the id is
/// permanent and never reassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role (system/user/assistant)
    pub role: Role,
    /// Message content
    pub content: String,
    /// Globally unique identity, unset while ephemeral
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Label derived from the view key at reconciliation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usecase: Option<String>,
    /// Model that produced or prompted this message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Server-assigned creation timestamp (unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// User feedback recorded against the canonical record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Message {
    /// Create a new ephemeral message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            id: None,
            usecase: None,
            model: None,
            created_at: None,
            feedback: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach a model tag.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Whether the message has no assigned identity yet.
    pub fn is_ephemeral(&self) -> bool {
        self.id.is_none()
    }
}

/// Reference to a durable server-side chat record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    /// Durable chat identifier
    pub chat_id: String,
    /// Chat title; empty until title assignment lands
    pub title: String,
}

impl ChatRef {
    /// A freshly created chat record with no title yet.
    pub fn untitled(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            title: String::new(),
        }
    }
}

/// The full conversation held by one view.
///
/// Owned exclusively by one view key at a time; at most one `ChatRef`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Durable binding, if the conversation has been promoted
    pub chat: Option<ChatRef>,
    /// Ordered message history
    pub messages: Vec<Message>,
}

impl ConversationState {
    /// Blank state: no durable binding, exactly one system message.
    pub fn blank(system_context: impl Into<String>) -> Self {
        Self {
            chat: None,
            messages: vec![Message::system(system_context)],
        }
    }
}
