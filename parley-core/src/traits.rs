//! Collaborator interfaces consumed by the engine.
//!
//! The engine never talks to a network directly: durable storage, model
//! invocation, prompt construction, and list-changed notification all
//! sit behind these traits and are injected as `Arc<dyn _>` at
//! construction. Retry policy belongs to the implementations, never to
//! the engine.

use async_trait::async_trait;
use futures::stream::BoxStream;
use parley_common::Result;

use crate::types::{ChatRef, Message, Role};

/// Lazy, ordered sequence of assistant output fragments.
///
/// Finite in practice; may be cancelled externally before completion.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Request forwarded to the inference collaborator for a streamed reply.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Model to use
    pub model: String,
    /// History submitted to the model
    pub history: Vec<Message>,
    /// Extra prompt suffix, if any
    pub extra_suffix: Option<String>,
    /// Stop sequences, if any
    pub stop_sequences: Vec<String>,
    /// Routing context for multi-turn agent sessions; never stored on messages
    pub session_id: Option<String>,
}

/// Durable chat storage backend.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Create a new durable chat record. The returned title is empty.
    async fn create_chat(&self) -> Result<ChatRef>;

    /// Record a batch of identified messages; returns the canonical
    /// records (server timestamps assigned, content possibly normalized).
    async fn create_messages(&self, chat_id: &str, unrecorded: Vec<Message>)
        -> Result<Vec<Message>>;

    /// Attach feedback to the message created at `created_at`.
    async fn update_feedback(
        &self,
        chat_id: &str,
        created_at: i64,
        feedback: &str,
    ) -> Result<Message>;

    /// List the canonical message history of a chat.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    /// Look up a chat record by id.
    async fn find_chat(&self, chat_id: &str) -> Result<ChatRef>;
}

/// Model invocation backend.
#[async_trait]
pub trait Inference: Send + Sync {
    /// Check whether a model id is in the catalog.
    fn supports_model(&self, model: &str) -> bool;

    /// Stream a reply for the given request.
    async fn predict_stream(&self, request: StreamRequest) -> Result<FragmentStream>;

    /// Infer a chat title from the reduced (role, content) history.
    async fn predict_title(&self, chat: &ChatRef, history: &[(Role, String)]) -> Result<String>;
}

/// Supplies the system context for a view, keyed by the selected model.
pub trait ContextProvider: Send + Sync {
    /// System context text for a blank conversation in `view`.
    fn system_context(&self, view: &str, model: Option<&str>) -> String;
}

/// Invoked after a title assignment lands, so chat lists can refresh.
pub trait ChatListNotifier: Send + Sync {
    /// Signal that the set of titled chats changed.
    fn chat_list_changed(&self);
}
