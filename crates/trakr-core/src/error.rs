//! Error taxonomy for trakr-core.

use std::path::PathBuf;

use trakr_history::HistoryError;
use trakr_remote::{FailureKind, RemoteError};

/// Errors produced while loading the project registry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("project {0} is registered more than once")]
    DuplicateProject(String),

    #[error("invalid project code: {0}")]
    InvalidCode(#[from] HistoryError),

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("project {project} has an unusable server url: {source}")]
    InvalidServerUrl {
        project: String,
        #[source]
        source: RemoteError,
    },
}

/// Errors that end one project's synchronization pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    /// The latest completed build id could not be determined; nothing was persisted.
    #[error("could not determine latest completed build: {0}")]
    LatestBuild(RemoteError),

    #[error("rebuild trigger failed: {0}")]
    Trigger(RemoteError),

    #[error("history store error: {0}")]
    History(#[from] HistoryError),
}

impl SyncError {
    /// Failure kind of the remote error behind this failure, if any.
    pub fn remote_kind(&self) -> Option<FailureKind> {
        match self {
            SyncError::LatestBuild(e) | SyncError::Trigger(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Whether this failure needs operator attention beyond a retry on the
    /// next run. Only server and transport failures are expected to clear up
    /// by themselves; a bad URL, a missing token or an unreadable store are not.
    pub fn needs_operator(&self) -> bool {
        !matches!(
            self.remote_kind(),
            Some(FailureKind::Server | FailureKind::Network)
        )
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
