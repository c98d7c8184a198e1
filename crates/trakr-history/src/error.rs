//! Error types for trakr-history

use thiserror::Error;

/// Errors that can occur in the history persistence layer
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The persisted history could not be decoded or belongs to another
    /// project. The store is left untouched.
    #[error("History store for project '{project}' is corrupt: {reason}")]
    Corrupt { project: String, reason: String },

    /// Project code cannot be used as a store key
    #[error("Invalid project code: {0:?}")]
    InvalidProjectCode(String),

    /// Serialization error
    #[error("Failed to encode history: {0}")]
    Encode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    /// Whether this error reports an unreadable store.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, HistoryError::Corrupt { .. })
    }
}
