//! Trakr Core Library
//!
//! The build result synchronization engine: keeps each registered project's
//! local build history in step with the CI server, and renders what it knows.
//!
//! Re-exports the pieces the `trakr` binary wires together.

pub mod error;
pub mod events;
pub mod regression;
pub mod registry;
pub mod summary;
pub mod sync;
pub mod telemetry;

pub use error::{ConfigError, Result, SyncError};
pub use regression::{detect as detect_regression, Regression};
pub use registry::ProjectRegistry;
pub use summary::{render_history, render_record, ProjectSummary, SummaryStatus};
pub use sync::{ProbeReport, SyncAction, SyncOutcome, Synchronizer};
pub use telemetry::init_tracing;

pub use trakr_history::{
    BuildRecord, FsHistoryStore, History, HistoryError, HistoryStore, ProjectCode, TestCounts,
};
pub use trakr_remote::{
    CiServer, FailureKind, JenkinsClient, ProjectEndpoint, RemoteConfig, RemoteError,
};
