//! Engine façade: the per-view surface and the `post_chat` pipeline.
//!
//! One `ChatEngine` serves the whole process; view keys partition its
//! state. Collaborators are injected once at construction and shared by
//! `Arc`. Scheduling is cooperative: state transitions are synchronous
//! whole-snapshot swaps, and suspension happens only at awaited
//! collaborator calls, so pipelines for different views may interleave
//! freely while a single view's state is never observed torn.

use std::sync::Arc;

use parley_common::{Error, Result};

use crate::config::EngineConfig;
use crate::store::ViewStore;
use crate::stream::StreamAccumulator;
use crate::traits::{ChatListNotifier, ContextProvider, Inference, Persistence, StreamRequest};
use crate::types::{ChatRef, ConversationState, Message, Role};
use crate::{promote, reconcile, title};

/// Pure content transformer injected around an exchange.
pub type Transform = Box<dyn Fn(String) -> String + Send + Sync>;

/// Options for a single `post_chat` call.
#[derive(Default)]
pub struct PostOptions {
    /// Send only `[system, current user turn]` instead of the full history
    pub ignore_history: bool,
    /// Applied to the submitted content before anything else sees it
    pub pre_process: Option<Transform>,
    /// Applied once to the final assistant content after streaming
    pub post_process: Option<Transform>,
    /// Extra prompt suffix forwarded to the inference collaborator
    pub extra_suffix: Option<String>,
    /// Stop sequences forwarded to the inference collaborator
    pub stop_sequences: Vec<String>,
    /// Routing context for multi-turn agent sessions; forwarded, never stored
    pub session_id: Option<String>,
}

/// Clears the advisory loading flag on every exit path, errors included.
struct LoadingGuard<'a> {
    store: &'a ViewStore,
    view: &'a str,
}

impl<'a> LoadingGuard<'a> {
    fn engage(store: &'a ViewStore, view: &'a str) -> Self {
        store.set_loading(view, true);
        Self { store, view }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_loading(self.view, false);
    }
}

/// The synchronization engine for multi-view chat surfaces.
pub struct ChatEngine {
    store: Arc<ViewStore>,
    persistence: Arc<dyn Persistence>,
    inference: Arc<dyn Inference>,
    context: Arc<dyn ContextProvider>,
    notifier: Arc<dyn ChatListNotifier>,
    config: EngineConfig,
}

impl ChatEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        inference: Arc<dyn Inference>,
        context: Arc<dyn ContextProvider>,
        notifier: Arc<dyn ChatListNotifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store: Arc::new(ViewStore::new()),
            persistence,
            inference,
            context,
            notifier,
            config,
        }
    }

    /// Shared handle to the underlying store, for read-side consumers.
    pub fn store(&self) -> Arc<ViewStore> {
        self.store.clone()
    }

    fn blank_state(&self, view: &str) -> ConversationState {
        let model = self.store.model_id(view);
        ConversationState::blank(self.context.system_context(view, model.as_deref()))
    }

    /// Create a blank state for the view if none exists; no-op otherwise.
    pub fn init(&self, view: &str) {
        if !self.store.contains(view) {
            let blank = self.blank_state(view);
            self.store.install(view, blank);
        }
    }

    /// Unconditionally reset the view to a blank system-only state.
    ///
    /// Drops the local durable binding; the server record is untouched.
    pub fn clear(&self, view: &str) {
        let blank = self.blank_state(view);
        self.store.install(view, blank);
    }

    /// Current snapshot for the view, if initialized.
    pub fn snapshot(&self, view: &str) -> Option<Arc<ConversationState>> {
        self.store.snapshot(view)
    }

    /// Selected model for the view.
    pub fn model_id(&self, view: &str) -> Option<String> {
        self.store.model_id(view)
    }

    /// Select a model for the view.
    pub fn set_model_id(&self, view: &str, model: impl Into<String>) {
        self.store.set_model_id(view, model);
    }

    /// Set the advisory loading flag.
    pub fn set_loading(&self, view: &str, loading: bool) {
        self.store.set_loading(view, loading);
    }

    /// Read the advisory loading flag.
    pub fn is_loading(&self, view: &str) -> bool {
        self.store.is_loading(view)
    }

    /// Append a message for callers composing custom flows.
    pub fn push_message(&self, view: &str, message: Message) -> bool {
        self.store.push_message(view, message)
    }

    /// Remove and return the trailing message, if any.
    pub fn pop_message(&self, view: &str) -> Option<Message> {
        self.store.pop_message(view)
    }

    /// Replace the unique system message's content.
    pub fn update_system_context(&self, view: &str, content: &str) -> bool {
        self.store.update_system_context(view, content)
    }

    /// Read the unique system message's content.
    pub fn current_system_context(&self, view: &str) -> Option<String> {
        self.store.current_system_context(view)
    }

    /// Hydrate a view from server-confirmed history.
    ///
    /// Any other view bound to the same chat is reset to blank first,
    /// so a durable chat is never open under two view keys at once.
    /// The server history is installed verbatim: its shape is
    /// authoritative, even when it does not start with a system message.
    pub fn restore(&self, view: &str, messages: Vec<Message>, chat: ChatRef) {
        for stale in self.store.views_bound_to(&chat.chat_id, view) {
            tracing::debug!(
                view = %stale,
                chat_id = %chat.chat_id,
                "collapsing duplicate view of restored chat"
            );
            let blank = self.blank_state(&stale);
            self.store.install(&stale, blank);
        }
        self.store.install(
            view,
            ConversationState {
                chat: Some(chat),
                messages,
            },
        );
    }

    /// Fetch a chat and its history from persistence, then restore it.
    pub async fn hydrate(&self, view: &str, chat_id: &str) -> Result<()> {
        let chat = self.persistence.find_chat(chat_id).await?;
        let messages = self.persistence.list_messages(chat_id).await?;
        self.restore(view, messages, chat);
        Ok(())
    }

    /// Post a user turn and synchronize the exchange end to end.
    ///
    /// Pipeline: stream accumulation, then lazy promotion to a durable
    /// chat, then detached title assignment for a fresh chat, then
    /// identity reconciliation. Precondition failures (no model
    /// selected, model not in catalog) return typed errors without
    /// touching messages or the loading flag. Stream and persistence
    /// errors propagate; the loading flag is cleared on every exit.
    pub async fn post_chat(&self, view: &str, content: &str, options: PostOptions) -> Result<()> {
        let Some(model) = self.store.model_id(view) else {
            tracing::warn!(view, "rejecting post: no model selected");
            return Err(Error::MissingModelSelection {
                view: view.to_string(),
            });
        };
        if !self.inference.supports_model(&model) {
            tracing::warn!(view, model = %model, "rejecting post: model not in catalog");
            return Err(Error::ModelNotFound { model });
        }

        self.init(view);
        let _loading = LoadingGuard::engage(&self.store, view);

        let content = match &options.pre_process {
            Some(transform) => transform(content.to_string()),
            None => content.to_string(),
        };

        let accumulator = StreamAccumulator::new(&self.store, view, &self.config.stream);
        accumulator.begin(&content, &model);

        let history = self.history_for_inference(view, options.ignore_history);
        let fragments = self
            .inference
            .predict_stream(StreamRequest {
                model: model.clone(),
                history,
                extra_suffix: options.extra_suffix.clone(),
                stop_sequences: options.stop_sequences.clone(),
                session_id: options.session_id.clone(),
            })
            .await?;
        accumulator.drain(fragments).await?;

        if let Some(transform) = &options.post_process {
            accumulator.finish(transform.as_ref());
        }

        let (chat, created) =
            promote::ensure_durable(&self.store, view, self.persistence.as_ref()).await?;
        if created && chat.title.is_empty() {
            title::spawn_assignment(
                self.store.clone(),
                view.to_string(),
                chat.clone(),
                self.inference.clone(),
                self.notifier.clone(),
            );
        }

        reconcile::reconcile(&self.store, view, &chat.chat_id, self.persistence.as_ref()).await
    }

    /// History snapshot submitted to inference: everything but the
    /// trailing placeholder, or `[system, current user turn]` when
    /// history is ignored.
    fn history_for_inference(&self, view: &str, ignore_history: bool) -> Vec<Message> {
        let Some(snapshot) = self.store.snapshot(view) else {
            return Vec::new();
        };
        let count = snapshot.messages.len().saturating_sub(1);
        let before_placeholder = &snapshot.messages[..count];
        if !ignore_history {
            return before_placeholder.to_vec();
        }

        let mut short = Vec::with_capacity(2);
        if let Some(system) = before_placeholder.iter().find(|m| m.role == Role::System) {
            short.push(system.clone());
        }
        if let Some(user) = before_placeholder.iter().rev().find(|m| m.role == Role::User) {
            short.push(user.clone());
        }
        short
    }

    /// Record feedback against the canonical message created at
    /// `created_at`; only that message is replaced locally.
    pub async fn send_feedback(&self, view: &str, created_at: i64, feedback: &str) -> Result<()> {
        let chat_id = self
            .store
            .snapshot(view)
            .and_then(|state| state.chat.clone())
            .ok_or_else(|| Error::NotDurable {
                view: view.to_string(),
            })?
            .chat_id;

        let canonical = self
            .persistence
            .update_feedback(&chat_id, created_at, feedback)
            .await?;

        self.store.mutate(view, |state| {
            if let Some(local) = state
                .messages
                .iter_mut()
                .find(|m| m.created_at == Some(created_at))
            {
                *local = canonical.clone();
            }
        });
        Ok(())
    }
}
