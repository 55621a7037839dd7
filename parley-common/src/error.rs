//! Error types for the Parley engine.

use thiserror::Error;

/// Result type alias using the Parley error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the engine and its collaborators.
#[derive(Error, Debug)]
pub enum Error {
    /// No model has been selected for the view
    #[error("no model selected for view '{view}'")]
    MissingModelSelection { view: String },

    /// The selected model id is not in the catalog
    #[error("model '{model}' is not available")]
    ModelNotFound { model: String },

    /// The view is not bound to a durable chat
    #[error("view '{view}' has no durable chat")]
    NotDurable { view: String },

    /// Persistence collaborator failure
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Inference collaborator failure
    #[error("inference error: {0}")]
    Inference(String),

    /// Fragment stream transport failure
    #[error("stream transport error: {0}")]
    Stream(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is a precondition failure: the caller's state was
    /// rejected before anything was mutated.
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingModelSelection { .. } | Self::ModelNotFound { .. } | Self::NotDurable { .. }
        )
    }

    /// Check if this is a transport-level stream failure.
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
