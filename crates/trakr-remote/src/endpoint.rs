//! Where a project lives on the CI server.

use serde::{Deserialize, Serialize};
use trakr_history::ProjectCode;

use crate::error::RemoteError;

/// Location and credentials of one project's job on the CI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEndpoint {
    /// Project code used for logging and storage.
    pub code: ProjectCode,
    /// Server base URL, e.g. `https://ci.example.com`.
    pub server_url: String,
    /// Job path below the server, e.g. `/job/web-tests`.
    pub path: String,
    /// Token for remotely triggered builds (optional).
    pub build_token: Option<String>,
}

impl ProjectEndpoint {
    pub fn new(code: ProjectCode, server_url: &str, path: &str) -> Self {
        ProjectEndpoint {
            code,
            server_url: server_url.to_string(),
            path: path.to_string(),
            build_token: None,
        }
    }

    /// Set the build trigger token
    pub fn with_token(mut self, token: &str) -> Self {
        self.build_token = Some(token.to_string());
        self
    }

    /// URL of the job, without a trailing slash.
    pub fn job_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Check that the job URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), RemoteError> {
        let url = reqwest::Url::parse(&self.job_url())
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(RemoteError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                self.server_url, other
            ))),
        }
    }

    /// URL of a resource below the job.
    pub fn url(&self, suffix: &str) -> String {
        format!("{}/{}", self.job_url(), suffix.trim_start_matches('/'))
    }
}
