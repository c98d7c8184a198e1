//! Jenkins REST API client
//!
//! Issues exactly one request per query and normalizes every outcome into
//! `Result<_, RemoteError>`. Failures are never retried here; the caller
//! decides what a failure means for the persisted timeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trakr_history::TestCounts;

use crate::api::{BuildIdResponse, TestReportResponse};
use crate::endpoint::ProjectEndpoint;
use crate::error::RemoteError;
use crate::Result;

const USER_AGENT: &str = concat!("trakr/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Per-request timeout; an expired timeout surfaces as `RemoteError::Network`
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            timeout_secs: std::env::var("TRAKR_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl RemoteConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Override the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Read (and one write) operations trakr needs from a CI server.
#[async_trait]
pub trait CiServer: Send + Sync {
    /// Id of the most recent completed build.
    async fn latest_completed_build_id(&self, project: &ProjectEndpoint) -> Result<u64>;

    /// Id of the most recent build, which may still be running.
    async fn latest_build_id(&self, project: &ProjectEndpoint) -> Result<u64>;

    /// Test counts of one build.
    async fn test_report(&self, project: &ProjectEndpoint, build_number: u64) -> Result<TestCounts>;

    /// Ask the server to run the project's job again. Fire-and-forget.
    async fn trigger_build(&self, project: &ProjectEndpoint) -> Result<()>;
}

/// `CiServer` implementation over the Jenkins JSON API.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http_client: reqwest::Client,
}

impl JenkinsClient {
    /// Create a new client
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        Ok(JenkinsClient { http_client })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(RemoteConfig::from_env())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, tree: &str) -> Result<T> {
        debug!(url = %url, tree = %tree, "GET");

        let response = self
            .http_client
            .get(url)
            .query(&[("tree", tree)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(server_error(status));
        }

        let body = response.bytes().await.map_err(|e| RemoteError::Network {
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| RemoteError::Server {
            status: status.as_u16(),
            reason: format!("unexpected response shape: {}", e),
        })
    }

    async fn build_id(&self, project: &ProjectEndpoint, which: &str) -> Result<u64> {
        let url = project.url(&format!("{}/api/json", which));
        let response: BuildIdResponse = self.get_json(&url, BuildIdResponse::TREE).await?;
        response
            .build_number()
            .map_err(|reason| RemoteError::Server {
                status: StatusCode::OK.as_u16(),
                reason,
            })
    }
}

#[async_trait]
impl CiServer for JenkinsClient {
    async fn latest_completed_build_id(&self, project: &ProjectEndpoint) -> Result<u64> {
        self.build_id(project, "lastCompletedBuild").await
    }

    async fn latest_build_id(&self, project: &ProjectEndpoint) -> Result<u64> {
        self.build_id(project, "lastBuild").await
    }

    async fn test_report(&self, project: &ProjectEndpoint, build_number: u64) -> Result<TestCounts> {
        let url = project.url(&format!("{}/testReport/api/json", build_number));
        let report: TestReportResponse = self.get_json(&url, TestReportResponse::TREE).await?;
        Ok(report.counts())
    }

    async fn trigger_build(&self, project: &ProjectEndpoint) -> Result<()> {
        let token = project
            .build_token
            .as_deref()
            .ok_or_else(|| RemoteError::MissingToken {
                project: project.code.to_string(),
            })?;

        let url = project.url("build");
        debug!(url = %url, "POST");

        let response = self
            .http_client
            .post(&url)
            .form(&[("token", token), ("delay", "0")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(server_error(status));
        }
        Ok(())
    }
}

fn server_error(status: StatusCode) -> RemoteError {
    RemoteError::Server {
        status: status.as_u16(),
        reason: status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_default() {
        let config = RemoteConfig::default();
        assert!(config.timeout_secs > 0);
        assert!(config.user_agent.starts_with("trakr/"));
    }

    #[test]
    fn test_remote_config_with_timeout() {
        let config = RemoteConfig::default().with_timeout_secs(3);
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn test_server_error_uses_canonical_reason() {
        let err = server_error(StatusCode::NOT_FOUND);
        assert_eq!(
            err,
            RemoteError::Server {
                status: 404,
                reason: "Not Found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = JenkinsClient::new(RemoteConfig::default().with_timeout_secs(2)).unwrap();
        let project = ProjectEndpoint::new(
            trakr_history::ProjectCode::new("WEB").unwrap(),
            "http://127.0.0.1:1",
            "/job/web",
        );

        let err = client.latest_completed_build_id(&project).await.unwrap_err();
        assert!(matches!(err, RemoteError::Network { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_trigger_without_token_fails_locally() {
        let client = JenkinsClient::from_env().unwrap();
        let project = ProjectEndpoint::new(
            trakr_history::ProjectCode::new("WEB").unwrap(),
            "http://127.0.0.1:1",
            "/job/web",
        );

        let err = client.trigger_build(&project).await.unwrap_err();
        assert!(matches!(err, RemoteError::MissingToken { .. }));
    }
}
