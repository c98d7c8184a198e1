//! Trakr-Remote: CI server client for trakr
//!
//! This crate is the only part of trakr that talks to the CI server. It
//! covers the Jenkins JSON endpoints trakr consumes:
//!
//! - `lastCompletedBuild` / `lastBuild` ids
//! - a build's `testReport` summary
//! - remote build trigger (token protected)
//!
//! ## Layer 1 - Remote API
//!
//! Focus: typed responses and a clean split between server-side failures
//! (`RemoteError::Server`) and transport failures (`RemoteError::Network`).

pub mod api;
pub mod client;
mod endpoint;
mod error;
pub mod fakes;

pub use api::{BuildIdResponse, TestReportResponse};
pub use client::{CiServer, JenkinsClient, RemoteConfig};
pub use endpoint::ProjectEndpoint;
pub use error::{FailureKind, RemoteError};

/// Result type for trakr-remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;
