//! Lazy promotion of an ephemeral conversation to a durable chat.

use parley_common::Result;

use crate::store::ViewStore;
use crate::traits::Persistence;
use crate::types::ChatRef;

/// Ensure the view is bound to a durable chat.
///
/// Gated purely on `ChatRef` presence: an existing binding is returned
/// unchanged, otherwise a chat record is created and attached. Returns
/// the binding plus whether this call created it.
pub(crate) async fn ensure_durable(
    store: &ViewStore,
    view: &str,
    persistence: &dyn Persistence,
) -> Result<(ChatRef, bool)> {
    if let Some(chat) = store.snapshot(view).and_then(|state| state.chat.clone()) {
        return Ok((chat, false));
    }

    let chat = persistence.create_chat().await?;
    tracing::debug!(view, chat_id = %chat.chat_id, "promoted conversation to durable chat");
    store.attach_chat(view, chat.clone());
    Ok((chat, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::types::{ConversationState, Message, Role};

    struct CountingPersistence {
        created: AtomicUsize,
    }

    impl CountingPersistence {
        fn new() -> Self {
            Self { created: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Persistence for CountingPersistence {
        async fn create_chat(&self) -> Result<ChatRef> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(ChatRef::untitled(format!("chat-{}", n)))
        }

        async fn create_messages(
            &self,
            _chat_id: &str,
            unrecorded: Vec<Message>,
        ) -> Result<Vec<Message>> {
            Ok(unrecorded)
        }

        async fn update_feedback(
            &self,
            _chat_id: &str,
            created_at: i64,
            feedback: &str,
        ) -> Result<Message> {
            let mut message = Message::new(Role::Assistant, "");
            message.created_at = Some(created_at);
            message.feedback = Some(feedback.to_string());
            Ok(message)
        }

        async fn list_messages(&self, _chat_id: &str) -> Result<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn find_chat(&self, chat_id: &str) -> Result<ChatRef> {
            Ok(ChatRef::untitled(chat_id))
        }
    }

    #[tokio::test]
    async fn test_promotes_once() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));
        let persistence = CountingPersistence::new();

        let (chat, created) = ensure_durable(&store, "/chat", &persistence).await.unwrap();
        assert!(created);
        assert_eq!(chat.chat_id, "chat-0");
        assert!(chat.title.is_empty());

        let (again, created) = ensure_durable(&store, "/chat", &persistence).await.unwrap();
        assert!(!created);
        assert_eq!(again.chat_id, "chat-0");
        assert_eq!(persistence.created.load(Ordering::SeqCst), 1);
    }
}
