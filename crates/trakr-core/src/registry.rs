//! Project registry loaded from the JSON config file.
//!
//! ```json
//! {
//!   "server_url": "https://ci.example.com",
//!   "data_dir": "trakr-data",
//!   "chart_command": ["trakr-chart", "--fullscreen"],
//!   "projects": [
//!     {"code": "WEB", "path": "/job/web-tests", "build_token": "s3cret"}
//!   ]
//! }
//! ```
//!
//! The older `CrashConfig.json` key names (`ServerLink`, `Projects`, `Code`,
//! `Link`, `BuildToken`) are accepted as aliases. The registry is read once and
//! is read-only afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;
use trakr_history::ProjectCode;
use trakr_remote::ProjectEndpoint;

use crate::error::ConfigError;

/// Default history directory, relative to the config file.
pub const DEFAULT_DATA_DIR: &str = "trakr-data";

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(alias = "ServerLink")]
    server_url: String,
    #[serde(default, alias = "DataDir")]
    data_dir: Option<PathBuf>,
    #[serde(default, alias = "ChartCommand")]
    chart_command: Option<Vec<String>>,
    #[serde(alias = "Projects")]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    #[serde(alias = "Code")]
    code: String,
    #[serde(alias = "Link")]
    path: String,
    #[serde(default, alias = "BuildToken")]
    build_token: Option<String>,
    #[serde(default, alias = "ServerLink")]
    server_url: Option<String>,
}

/// Registered projects in config order, plus run-wide settings.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    projects: Vec<ProjectEndpoint>,
    data_dir: PathBuf,
    chart_command: Option<Vec<String>>,
}

impl ProjectRegistry {
    /// Read the registry from `path`. A relative `data_dir` is resolved
    /// against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let registry = Self::from_json(&content, base)?;
        info!(
            event = "config.loaded",
            path = %path.display(),
            projects = registry.projects.len(),
        );
        Ok(registry)
    }

    /// Parse registry JSON, resolving a relative `data_dir` against `base`.
    pub fn from_json(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let file: RegistryFile = serde_json::from_str(content)?;

        let mut seen = HashSet::new();
        let mut projects = Vec::with_capacity(file.projects.len());
        for entry in file.projects {
            let code = ProjectCode::new(entry.code)?;
            if !seen.insert(code.clone()) {
                return Err(ConfigError::DuplicateProject(code.to_string()));
            }
            let server_url = entry.server_url.as_deref().unwrap_or(&file.server_url);
            let mut endpoint = ProjectEndpoint::new(code, server_url, &entry.path);
            if let Some(token) = entry.build_token.filter(|t| !t.is_empty()) {
                endpoint = endpoint.with_token(&token);
            }
            endpoint
                .validate()
                .map_err(|source| ConfigError::InvalidServerUrl {
                    project: endpoint.code.to_string(),
                    source,
                })?;
            projects.push(endpoint);
        }

        let data_dir = file
            .data_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let data_dir = if data_dir.is_absolute() {
            data_dir
        } else {
            base.join(data_dir)
        };

        Ok(ProjectRegistry {
            projects,
            data_dir,
            chart_command: file.chart_command.filter(|c| !c.is_empty()),
        })
    }

    /// Registry built directly from endpoints (tests, embedding).
    pub fn from_endpoints(projects: Vec<ProjectEndpoint>, data_dir: impl Into<PathBuf>) -> Self {
        ProjectRegistry {
            projects,
            data_dir: data_dir.into(),
            chart_command: None,
        }
    }

    /// Project codes in registry order.
    pub fn codes(&self) -> Vec<ProjectCode> {
        self.projects.iter().map(|p| p.code.clone()).collect()
    }

    pub fn endpoint(&self, code: &ProjectCode) -> Option<&ProjectEndpoint> {
        self.projects.iter().find(|p| &p.code == code)
    }

    /// Turn a user selection into registered codes, in the order given.
    /// An empty selection means every project, in registry order.
    pub fn resolve(&self, selection: &[String]) -> Result<Vec<ProjectCode>, ConfigError> {
        if selection.is_empty() {
            return Ok(self.codes());
        }
        selection
            .iter()
            .map(|raw| {
                self.projects
                    .iter()
                    .find(|p| p.code.as_str() == raw)
                    .map(|p| p.code.clone())
                    .ok_or_else(|| ConfigError::UnknownProject(raw.clone()))
            })
            .collect()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn chart_command(&self) -> Option<&[String]> {
        self.chart_command.as_deref()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
