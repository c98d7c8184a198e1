//! Structured audit events for the synchronization pass.
//!
//! This module provides:
//! - A project-scoped tracing span via `project_span`
//! - One emission function per audit event: fetch success/failure, merge
//!   performed/skipped, and pass start/finish/abort
//!
//! Every event carries an `event` name and the `project` code; the subscriber
//! adds the timestamp. With an audit log configured each event becomes one line.

use tracing::{error, info, warn};
use trakr_history::{BuildRecord, ProjectCode, TestCounts};
use trakr_remote::RemoteError;

/// Span covering one project's synchronization pass.
///
/// Attach it with `Instrument::instrument` so every event of the pass carries
/// the project code and the run id.
pub fn project_span(project: &ProjectCode, run_id: &str) -> tracing::Span {
    tracing::info_span!("trakr.sync", project = %project, run_id = %run_id)
}

/// Emit event: pass started, with the locally known head.
pub fn emit_sync_started(project: &ProjectCode, local_head: Option<u64>) {
    info!(event = "sync.started", project = %project, local_head = ?local_head);
}

/// Emit event: a remote query succeeded.
pub fn emit_fetch_succeeded(project: &ProjectCode, query: &str, build_number: u64) {
    info!(
        event = "fetch.succeeded",
        project = %project,
        query = query,
        build_number = build_number,
    );
}

/// Emit event: a remote query failed (warning level).
pub fn emit_fetch_failed(
    project: &ProjectCode,
    query: &str,
    build_number: Option<u64>,
    error: &RemoteError,
) {
    warn!(
        event = "fetch.failed",
        project = %project,
        query = query,
        build_number = ?build_number,
        kind = %error.kind(),
        error = %error,
    );
}

/// Emit event: a record was written to the store.
pub fn emit_merge_performed(project: &ProjectCode, record: &BuildRecord) {
    info!(
        event = "merge.performed",
        project = %project,
        build_number = record.build_number,
        known = !record.is_unknown(),
    );
}

/// Emit event: a record repeated the head and was dropped.
pub fn emit_merge_skipped(project: &ProjectCode, build_number: u64) {
    info!(event = "merge.skipped", project = %project, build_number = build_number);
}

/// Emit event: the remote latest build is behind the local head (warning level).
pub fn emit_remote_behind(project: &ProjectCode, local_head: u64, remote_latest: u64) {
    warn!(
        event = "sync.remote_behind",
        project = %project,
        local_head = local_head,
        remote_latest = remote_latest,
    );
}

/// Emit event: a refreshed report differs from the stored head (warning level).
pub fn emit_stale_counts(
    project: &ProjectCode,
    build_number: u64,
    stored: Option<TestCounts>,
    fetched: TestCounts,
) {
    warn!(
        event = "sync.stale_counts",
        project = %project,
        build_number = build_number,
        stored = ?stored,
        fetched = ?fetched,
    );
}

/// Emit event: pass finished.
pub fn emit_sync_finished(project: &ProjectCode, action: &str, added: usize, head: Option<u64>) {
    info!(
        event = "sync.finished",
        project = %project,
        action = action,
        added = added,
        head = ?head,
    );
}

/// Emit event: pass aborted before anything was persisted (error level).
pub fn emit_sync_aborted(project: &ProjectCode, error: &dyn std::fmt::Display) {
    error!(event = "sync.aborted", project = %project, error = %error);
}

/// Emit event: a rebuild was requested.
pub fn emit_rebuild_triggered(project: &ProjectCode, reason: &str) {
    info!(event = "rebuild.triggered", project = %project, reason = reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_span_create() {
        let code = ProjectCode::new("WEB").unwrap();
        let span = project_span(&code, "test-run-id");
        let _entered = span.enter();
    }
}
