//! Error types for the graph store.

use thiserror::Error;

/// Result alias for graph store operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("depth must be between {min} and {max}, got {got}")]
    InvalidDepth { got: u32, min: u32, max: u32 },

    #[error("db lock poisoned")]
    LockPoisoned,
}
