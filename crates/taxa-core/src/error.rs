//! Error types for the taxa tagging engine.

use thiserror::Error;

/// Result type alias using taxa's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tagging operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Scheme name does not resolve to a registered scheme
    #[error("Scheme not found: {0}")]
    SchemeNotFound(String),

    /// Tag name does not resolve within its scheme
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// Import source has no root concept
    #[error("No root concept in scheme '{0}'")]
    NoRoot(String),

    /// Import source has more than one root concept
    #[error("Expected one root concept in scheme '{scheme}', got {count}")]
    MultipleRoots {
        /// Target scheme name.
        scheme: String,
        /// Number of root candidates found.
        count: usize,
    },

    /// Import relation references a concept that cannot be resolved
    #[error("Dangling concept reference: {0}")]
    DanglingReference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
