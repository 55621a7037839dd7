//! Parley Core - synchronization engine for multi-view chat surfaces.
//!
//! Each view key identifies an independent chat surface backed by a
//! conversation that starts purely in memory and is promoted to durable
//! storage once its first exchange completes. The engine reconciles the
//! three timelines involved:
//!
//! - in-memory streaming updates arriving fragment by fragment,
//! - the durable record created lazily on the server,
//! - the possibility that the same durable chat is simultaneously open
//!   under a different view key.
//!
//! ## Architecture
//!
//! - [`store::ViewStore`] - keyed state, mutated only by snapshot →
//!   builder → atomic swap
//! - `stream` - fragment accumulation onto the trailing assistant message
//! - `reconcile` - identity assignment and canonical-record merge
//! - `promote` - lazy durable-chat creation
//! - `title` - detached title assignment with stale-completion guard
//! - [`engine::ChatEngine`] - the per-view surface; `post_chat`
//!   orchestrates the pipeline
//!
//! Durable storage, model invocation, prompt construction, and list
//! change notification are collaborators behind the traits in
//! [`traits`].

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod engine;
pub mod store;
pub mod traits;
pub mod types;

mod promote;
mod reconcile;
mod stream;
mod title;

pub use config::{EngineConfig, StreamConfig};
pub use engine::{ChatEngine, PostOptions, Transform};
pub use parley_common::{Error, Result};
pub use store::ViewStore;
pub use traits::{
    ChatListNotifier, ContextProvider, FragmentStream, Inference, Persistence, StreamRequest,
};
pub use types::{ChatRef, ConversationState, Message, Role};
