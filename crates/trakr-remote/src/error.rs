//! Error types for trakr-remote

use thiserror::Error;

/// Broad category of a remote failure, used for logging and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server answered but signalled failure.
    Server,
    /// The request never completed.
    Network,
    /// Local misconfiguration (bad URL, missing token).
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Server => "server",
            FailureKind::Network => "network",
            FailureKind::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by CI server queries. No variant is ever retried by the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Non-2xx status, or a body that does not match the endpoint's schema
    #[error("Server error {status}: {reason}")]
    Server { status: u16, reason: String },

    /// DNS, connection or timeout failure
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// Rebuild requested for a project without a build token
    #[error("Project {project} has no build token configured")]
    MissingToken { project: String },

    /// Endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed or the request could not be built
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl RemoteError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::Server { .. } => FailureKind::Server,
            RemoteError::Network { .. } => FailureKind::Network,
            _ => FailureKind::Other,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return RemoteError::InvalidUrl(err.to_string());
        }
        if let Some(status) = err.status() {
            return RemoteError::Server {
                status: status.as_u16(),
                reason: err.to_string(),
            };
        }
        RemoteError::Network {
            reason: err.to_string(),
        }
    }
}
