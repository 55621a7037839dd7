//! Keyed view-state store.
//!
//! One store instance serves the whole process; each view key is a
//! logical partition inside it. Every mutation takes the current
//! snapshot, clones it into a builder, applies the edit, and swaps a
//! fresh `Arc` in place, so a reader holding a snapshot never observes
//! a partially-mutated state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{ChatRef, ConversationState, Message, Role};

#[derive(Default)]
struct Views {
    states: HashMap<String, Arc<ConversationState>>,
    models: HashMap<String, String>,
    loading: HashMap<String, bool>,
}

/// Keyed store of per-view conversation state, model selection, and
/// advisory loading flags.
///
/// Model selection and loading flags live outside the conversation
/// snapshot: `clear` and `restore` replace the conversation without
/// touching them.
#[derive(Default)]
pub struct ViewStore {
    inner: RwLock<Views>,
}

impl ViewStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // State is only ever replaced by whole-Arc swaps, so a poisoned
    // lock still guards a whole value; recover instead of propagating.
    fn read(&self) -> RwLockReadGuard<'_, Views> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Views> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current snapshot for a view, if initialized.
    pub fn snapshot(&self, view: &str) -> Option<Arc<ConversationState>> {
        self.read().states.get(view).cloned()
    }

    /// Whether the view holds any state.
    pub fn contains(&self, view: &str) -> bool {
        self.read().states.contains_key(view)
    }

    /// Unconditionally replace the view's conversation state.
    pub fn install(&self, view: &str, state: ConversationState) {
        self.write()
            .states
            .insert(view.to_string(), Arc::new(state));
    }

    /// Apply an edit through the snapshot-builder-swap cycle.
    ///
    /// Returns `None` without calling `edit` when the view holds no
    /// state.
    pub fn mutate<R>(&self, view: &str, edit: impl FnOnce(&mut ConversationState) -> R) -> Option<R> {
        let mut inner = self.write();
        let slot = inner.states.get_mut(view)?;
        let mut draft = (**slot).clone();
        let out = edit(&mut draft);
        *slot = Arc::new(draft);
        Some(out)
    }

    /// Selected model for the view.
    pub fn model_id(&self, view: &str) -> Option<String> {
        self.read().models.get(view).cloned()
    }

    /// Select a model for the view.
    pub fn set_model_id(&self, view: &str, model: impl Into<String>) {
        self.write().models.insert(view.to_string(), model.into());
    }

    /// Set the advisory loading flag. Not a lock: the engine never
    /// gates on it.
    pub fn set_loading(&self, view: &str, loading: bool) {
        self.write().loading.insert(view.to_string(), loading);
    }

    /// Read the advisory loading flag (false when never set).
    pub fn is_loading(&self, view: &str) -> bool {
        self.read().loading.get(view).copied().unwrap_or(false)
    }

    /// Append a message for callers composing custom flows.
    ///
    /// Returns false when the view holds no state.
    pub fn push_message(&self, view: &str, message: Message) -> bool {
        self.mutate(view, |state| state.messages.push(message))
            .is_some()
    }

    /// Remove and return the trailing message, or `None` if the list
    /// (or the view) is empty.
    pub fn pop_message(&self, view: &str) -> Option<Message> {
        self.mutate(view, |state| state.messages.pop()).flatten()
    }

    /// Replace the unique system message's content.
    ///
    /// Returns false when no system message exists.
    pub fn update_system_context(&self, view: &str, content: &str) -> bool {
        self.mutate(view, |state| {
            match state.messages.iter_mut().find(|m| m.role == Role::System) {
                Some(system) => {
                    system.content = content.to_string();
                    true
                }
                None => false,
            }
        })
        .unwrap_or(false)
    }

    /// Read the unique system message's content, if one exists.
    pub fn current_system_context(&self, view: &str) -> Option<String> {
        self.snapshot(view)?
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    /// Bind the view to a durable chat.
    pub fn attach_chat(&self, view: &str, chat: ChatRef) {
        self.mutate(view, |state| state.chat = Some(chat));
    }

    /// Commit a title iff the view is still bound to `chat_id`.
    ///
    /// A completion landing after the view was cleared or re-bound is
    /// reported as stale (false) and writes nothing.
    pub fn commit_title(&self, view: &str, chat_id: &str, title: &str) -> bool {
        self.mutate(view, |state| match state.chat.as_mut() {
            Some(chat) if chat.chat_id == chat_id => {
                chat.title = title.to_string();
                true
            }
            _ => false,
        })
        .unwrap_or(false)
    }

    /// Every view other than `except` currently bound to `chat_id`.
    pub fn views_bound_to(&self, chat_id: &str, except: &str) -> Vec<String> {
        self.read()
            .states
            .iter()
            .filter(|(key, state)| {
                key.as_str() != except
                    && state
                        .chat
                        .as_ref()
                        .is_some_and(|chat| chat.chat_id == chat_id)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_missing_view() {
        let store = ViewStore::new();
        assert!(store.snapshot("/chat").is_none());
        assert!(!store.contains("/chat"));
    }

    #[test]
    fn test_install_and_snapshot() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));

        let snapshot = store.snapshot("/chat").unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::System);
    }

    #[test]
    fn test_mutation_does_not_disturb_held_snapshots() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));

        let before = store.snapshot("/chat").unwrap();
        store.push_message("/chat", Message::user("Hello"));
        let after = store.snapshot("/chat").unwrap();

        // The earlier snapshot is a distinct, unchanged state.
        assert_eq!(before.messages.len(), 1);
        assert_eq!(after.messages.len(), 2);
    }

    #[test]
    fn test_mutate_missing_view_is_noop() {
        let store = ViewStore::new();
        assert!(store.mutate("/chat", |_| ()).is_none());
        assert!(!store.push_message("/chat", Message::user("x")));
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));

        store.push_message("/chat", Message::user("one"));
        let popped = store.pop_message("/chat").unwrap();
        assert_eq!(popped.content, "one");

        // Only the system message remains; popping it empties the list.
        assert!(store.pop_message("/chat").is_some());
        assert!(store.pop_message("/chat").is_none());
    }

    #[test]
    fn test_model_selection_survives_install() {
        let store = ViewStore::new();
        store.set_model_id("/chat", "modelA");
        store.install("/chat", ConversationState::blank("ctx"));
        store.install("/chat", ConversationState::blank("ctx"));
        assert_eq!(store.model_id("/chat").as_deref(), Some("modelA"));
    }

    #[test]
    fn test_loading_flag_defaults_false() {
        let store = ViewStore::new();
        assert!(!store.is_loading("/chat"));
        store.set_loading("/chat", true);
        assert!(store.is_loading("/chat"));
        store.set_loading("/chat", false);
        assert!(!store.is_loading("/chat"));
    }

    #[test]
    fn test_system_context_ops() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("original"));

        assert_eq!(store.current_system_context("/chat").as_deref(), Some("original"));
        assert!(store.update_system_context("/chat", "replaced"));
        assert_eq!(store.current_system_context("/chat").as_deref(), Some("replaced"));
    }

    #[test]
    fn test_system_context_fails_soft_without_system_message() {
        let store = ViewStore::new();
        store.install(
            "/chat",
            ConversationState {
                chat: None,
                messages: vec![Message::user("no system here")],
            },
        );

        assert!(!store.update_system_context("/chat", "ignored"));
        assert!(store.current_system_context("/chat").is_none());
    }

    #[test]
    fn test_commit_title_matches_binding() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));
        store.attach_chat("/chat", ChatRef::untitled("chat-1"));

        assert!(store.commit_title("/chat", "chat-1", "Greetings"));
        let snapshot = store.snapshot("/chat").unwrap();
        assert_eq!(snapshot.chat.as_ref().unwrap().title, "Greetings");
    }

    #[test]
    fn test_commit_title_stale_binding_rejected() {
        let store = ViewStore::new();
        store.install("/chat", ConversationState::blank("ctx"));
        store.attach_chat("/chat", ChatRef::untitled("chat-2"));

        assert!(!store.commit_title("/chat", "chat-1", "Stale"));
        let snapshot = store.snapshot("/chat").unwrap();
        assert!(snapshot.chat.as_ref().unwrap().title.is_empty());

        // Cleared view: nothing to commit into.
        store.install("/chat", ConversationState::blank("ctx"));
        assert!(!store.commit_title("/chat", "chat-2", "Stale"));
    }

    #[test]
    fn test_views_bound_to_excludes_self() {
        let store = ViewStore::new();
        let mut bound = ConversationState::blank("ctx");
        bound.chat = Some(ChatRef::untitled("chat-1"));
        store.install("/a", bound.clone());
        store.install("/b", bound);
        store.install("/c", ConversationState::blank("ctx"));

        let views = store.views_bound_to("chat-1", "/b");
        assert_eq!(views, vec!["/a".to_string()]);
    }
}
