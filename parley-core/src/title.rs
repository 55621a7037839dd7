//! Asynchronous title assignment for freshly promoted chats.

use std::sync::Arc;

use crate::store::ViewStore;
use crate::traits::{ChatListNotifier, Inference};
use crate::types::{ChatRef, Role};

/// Fire-and-forget title inference for a just-created chat.
///
/// The task is detached: `post_chat` never awaits or cancels it. The
/// commit is keyed by `(view, chat_id)`, so a completion that lands
/// after the view was cleared or re-bound writes nothing and the
/// list-changed notifier stays silent.
pub(crate) fn spawn_assignment(
    store: Arc<ViewStore>,
    view: String,
    chat: ChatRef,
    inference: Arc<dyn Inference>,
    notifier: Arc<dyn ChatListNotifier>,
) {
    let history: Vec<(Role, String)> = store
        .snapshot(&view)
        .map(|state| {
            state
                .messages
                .iter()
                .map(|m| (m.role, m.content.clone()))
                .collect()
        })
        .unwrap_or_default();

    tokio::spawn(async move {
        match inference.predict_title(&chat, &history).await {
            Ok(title) if !title.is_empty() => {
                if store.commit_title(&view, &chat.chat_id, &title) {
                    notifier.chat_list_changed();
                } else {
                    tracing::debug!(
                        view = %view,
                        chat_id = %chat.chat_id,
                        "discarding stale title for re-bound view"
                    );
                }
            }
            Ok(_) => {
                tracing::debug!(view = %view, chat_id = %chat.chat_id, "title prediction came back empty");
            }
            Err(error) => {
                tracing::warn!(view = %view, chat_id = %chat.chat_id, error = %error, "title prediction failed");
            }
        }
    });
}
