//! Build result synchronization.
//!
//! One pass per project decides how far the local history lags the CI server
//! and drives it back in sync:
//!
//! - no local history: populate builds `1..=latest`
//! - head behind remote: backfill `head+1..=latest`, oldest first
//! - head equal to remote: refresh probe of the head build
//! - head ahead of remote: warn, change nothing
//!
//! Failures are partitioned by blast radius. If the latest completed build id
//! cannot be fetched the project's pass stops before anything is written. A
//! failed report for one build is stored as an unknown record and the pass
//! moves on to the next build.

use std::sync::Arc;

use tracing::{debug, Instrument};
use trakr_history::{BuildRecord, HistoryStore, ProjectCode, TestCounts};
use trakr_remote::{CiServer, ProjectEndpoint, RemoteError};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::events;
use crate::registry::ProjectRegistry;

/// What a pass did for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// No history existed; builds `1..=latest` were fetched.
    FreshPopulate,
    /// Builds `from..=to` were fetched in ascending order.
    Backfill { from: u64, to: u64 },
    /// Already in sync; the head build's report was re-fetched.
    Refresh,
    /// The server reports a latest build older than the local head.
    RemoteBehind,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::FreshPopulate => "fresh_populate",
            SyncAction::Backfill { .. } => "backfill",
            SyncAction::Refresh => "refresh",
            SyncAction::RemoteBehind => "remote_behind",
        }
    }
}

/// Result of one project's pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub project: ProjectCode,
    pub action: SyncAction,
    /// Latest completed build id reported by the server.
    pub remote_latest: u64,
    /// Records written during the pass.
    pub added: usize,
    /// Head of the persisted history after the pass.
    pub head: Option<BuildRecord>,
}

/// Latest build ids as seen by the server, next to the local head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub project: ProjectCode,
    pub local_head: Option<u64>,
    pub latest: std::result::Result<u64, RemoteError>,
    pub latest_completed: std::result::Result<u64, RemoteError>,
}

/// Drives synchronization passes against one registry, store and server.
///
/// Built once per invocation; read-only afterwards.
pub struct Synchronizer {
    registry: ProjectRegistry,
    store: Arc<dyn HistoryStore>,
    server: Arc<dyn CiServer>,
    run_id: String,
}

impl Synchronizer {
    pub fn new(
        registry: ProjectRegistry,
        store: Arc<dyn HistoryStore>,
        server: Arc<dyn CiServer>,
    ) -> Self {
        Self {
            registry,
            store,
            server,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn HistoryStore {
        self.store.as_ref()
    }

    /// Identifier shared by every event of this invocation.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn endpoint(&self, code: &ProjectCode) -> Result<&ProjectEndpoint> {
        self.registry
            .endpoint(code)
            .ok_or_else(|| SyncError::UnknownProject(code.to_string()))
    }

    /// Synchronize each project in turn. A failing project does not stop the others.
    pub async fn sync_all(
        &self,
        codes: &[ProjectCode],
    ) -> Vec<(ProjectCode, Result<SyncOutcome>)> {
        let mut results = Vec::with_capacity(codes.len());
        for code in codes {
            let result = self.sync_project(code).await;
            results.push((code.clone(), result));
        }
        results
    }

    /// Run one synchronization pass for `code`.
    pub async fn sync_project(&self, code: &ProjectCode) -> Result<SyncOutcome> {
        let endpoint = self.endpoint(code)?;
        self.run_pass(endpoint)
            .instrument(events::project_span(code, &self.run_id))
            .await
    }

    async fn run_pass(&self, endpoint: &ProjectEndpoint) -> Result<SyncOutcome> {
        let code = &endpoint.code;

        // An unreadable store fails here, before any network traffic.
        let history = self.store.load(code)?;
        let local_head = history.head().copied();
        events::emit_sync_started(code, local_head.map(|r| r.build_number));

        let remote_latest = match self.server.latest_completed_build_id(endpoint).await {
            Ok(id) => {
                events::emit_fetch_succeeded(code, "latest_completed_build", id);
                id
            }
            Err(e) => {
                events::emit_fetch_failed(code, "latest_completed_build", None, &e);
                let err = SyncError::LatestBuild(e);
                events::emit_sync_aborted(code, &err);
                return Err(err);
            }
        };

        let (action, added) = match local_head {
            None => {
                let added = self.record_range(endpoint, 1, remote_latest).await?;
                (SyncAction::FreshPopulate, added)
            }
            Some(head) if remote_latest > head.build_number => {
                let from = head.build_number + 1;
                let added = self.record_range(endpoint, from, remote_latest).await?;
                (
                    SyncAction::Backfill {
                        from,
                        to: remote_latest,
                    },
                    added,
                )
            }
            Some(head) if remote_latest == head.build_number => {
                let added = self.refresh_head(endpoint, head).await?;
                (SyncAction::Refresh, added)
            }
            Some(head) => {
                events::emit_remote_behind(code, head.build_number, remote_latest);
                (SyncAction::RemoteBehind, 0)
            }
        };

        let head = self.store.load(code)?.head().copied();
        events::emit_sync_finished(code, action.as_str(), added, head.map(|r| r.build_number));

        Ok(SyncOutcome {
            project: code.clone(),
            action,
            remote_latest,
            added,
            head,
        })
    }

    /// Fetch and merge builds `from..=to` in ascending order.
    ///
    /// Each merge is persisted before the next fetch, so an interrupted pass
    /// leaves a valid history behind.
    async fn record_range(&self, endpoint: &ProjectEndpoint, from: u64, to: u64) -> Result<usize> {
        let mut added = 0;
        for build_number in from..=to {
            let record = self.fetch_record(endpoint, build_number).await;
            if self.merge(&endpoint.code, record)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Re-fetch the head build. The merge is a no-op for an unchanged build
    /// number; differing counts are reported, not rewritten.
    async fn refresh_head(&self, endpoint: &ProjectEndpoint, head: BuildRecord) -> Result<usize> {
        let record = self.fetch_record(endpoint, head.build_number).await;
        if let Some(fetched) = record.counts {
            if head.counts != Some(fetched) {
                events::emit_stale_counts(&endpoint.code, head.build_number, head.counts, fetched);
            }
        }
        Ok(usize::from(self.merge(&endpoint.code, record)?))
    }

    /// Fetch one build's report, converting a failure into an unknown record.
    async fn fetch_record(&self, endpoint: &ProjectEndpoint, build_number: u64) -> BuildRecord {
        match self.server.test_report(endpoint, build_number).await {
            Ok(counts) => {
                events::emit_fetch_succeeded(&endpoint.code, "test_report", build_number);
                BuildRecord::known(build_number, counts)
            }
            Err(e) => {
                events::emit_fetch_failed(&endpoint.code, "test_report", Some(build_number), &e);
                BuildRecord::unknown(build_number)
            }
        }
    }

    fn merge(&self, code: &ProjectCode, record: BuildRecord) -> Result<bool> {
        let wrote = self.store.merge(code, record)?;
        if wrote {
            events::emit_merge_performed(code, &record);
        } else {
            events::emit_merge_skipped(code, record.build_number);
        }
        Ok(wrote)
    }

    /// Query both latest-build endpoints without touching the store's contents.
    pub async fn probe(&self, code: &ProjectCode) -> Result<ProbeReport> {
        let endpoint = self.endpoint(code)?;
        let local_head = self.store.load(code)?.head().map(|r| r.build_number);

        let latest = self.server.latest_build_id(endpoint).await;
        let latest_completed = self.server.latest_completed_build_id(endpoint).await;
        for (query, result) in [("latest_build", &latest), ("latest_completed_build", &latest_completed)] {
            match result {
                Ok(id) => events::emit_fetch_succeeded(code, query, *id),
                Err(e) => events::emit_fetch_failed(code, query, None, e),
            }
        }

        Ok(ProbeReport {
            project: code.clone(),
            local_head,
            latest,
            latest_completed,
        })
    }

    /// Reports of the last `count` completed builds, most recent first.
    /// Nothing is persisted.
    pub async fn recent_reports(
        &self,
        code: &ProjectCode,
        count: usize,
    ) -> Result<Vec<(u64, std::result::Result<TestCounts, RemoteError>)>> {
        let endpoint = self.endpoint(code)?;
        let latest = self
            .server
            .latest_completed_build_id(endpoint)
            .await
            .map_err(SyncError::LatestBuild)?;

        let mut reports = Vec::new();
        for build_number in (1..=latest).rev().take(count) {
            debug!(project = %code, build_number, "Fetching recent report");
            let report = self.server.test_report(endpoint, build_number).await;
            if let Err(e) = &report {
                events::emit_fetch_failed(code, "test_report", Some(build_number), e);
            }
            reports.push((build_number, report));
        }
        Ok(reports)
    }

    /// Ask the server to rebuild the project.
    pub async fn trigger(&self, code: &ProjectCode, reason: &str) -> Result<()> {
        let endpoint = self.endpoint(code)?;
        match self.server.trigger_build(endpoint).await {
            Ok(()) => {
                events::emit_rebuild_triggered(code, reason);
                Ok(())
            }
            Err(e) => {
                events::emit_fetch_failed(code, "trigger_build", None, &e);
                Err(SyncError::Trigger(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trakr_history::fakes::MemoryHistoryStore;
    use trakr_remote::fakes::ScriptedCiServer;
    use tracing_test::traced_test;

    fn code() -> ProjectCode {
        ProjectCode::new("WEB").unwrap()
    }

    fn synchronizer(store: MemoryHistoryStore, server: ScriptedCiServer) -> Synchronizer {
        let registry = ProjectRegistry::from_endpoints(
            vec![ProjectEndpoint::new(code(), "http://ci", "/job/web")],
            "unused",
        );
        Synchronizer::new(registry, Arc::new(store), Arc::new(server))
    }

    #[test]
    fn test_action_names() {
        assert_eq!(SyncAction::FreshPopulate.as_str(), "fresh_populate");
        assert_eq!(SyncAction::Backfill { from: 1, to: 2 }.as_str(), "backfill");
        assert_eq!(SyncAction::Refresh.as_str(), "refresh");
        assert_eq!(SyncAction::RemoteBehind.as_str(), "remote_behind");
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let sync = synchronizer(MemoryHistoryStore::new(), ScriptedCiServer::new());
        let err = sync
            .sync_project(&ProjectCode::new("NOPE").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownProject(_)));
    }

    #[tokio::test]
    async fn test_corrupt_store_stops_before_network() {
        let store = MemoryHistoryStore::new().with_corrupt(&code(), "bad json");
        let server = ScriptedCiServer::new().with_latest_completed(&code(), Ok(3));
        let sync = synchronizer(store, server);

        let err = sync.sync_project(&code()).await.unwrap_err();
        assert!(matches!(err, SyncError::History(ref e) if e.is_corrupt()));
    }

    #[tokio::test]
    async fn test_recent_reports_most_recent_first() {
        let server = ScriptedCiServer::new()
            .with_latest_completed(&code(), Ok(3))
            .with_reports(&code(), 1..=3, TestCounts::new(10, 1));
        let sync = synchronizer(MemoryHistoryStore::new(), server);

        let reports = sync.recent_reports(&code(), 6).await.unwrap();
        let numbers: Vec<u64> = reports.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
        assert!(sync.store().load(&code()).unwrap().is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_pass_emits_fetch_and_merge_events() {
        let store = MemoryHistoryStore::new()
            .with_history(&code(), vec![BuildRecord::known(1, TestCounts::new(5, 0))]);
        let server = ScriptedCiServer::new()
            .with_latest_completed(&code(), Ok(3))
            .with_report(&code(), 2, Ok(TestCounts::new(5, 1)))
            .with_report(
                &code(),
                3,
                Err(RemoteError::Network {
                    reason: "timed out".to_string(),
                }),
            );
        let sync = synchronizer(store, server);

        sync.sync_project(&code()).await.unwrap();

        assert!(logs_contain("sync.started"));
        assert!(logs_contain("merge.performed"));
        assert!(logs_contain("fetch.failed"));
        assert!(logs_contain("kind=network"));
        assert!(logs_contain("sync.finished"));
        assert!(logs_contain(sync.run_id()));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_abort_and_remote_behind_events() {
        let store = MemoryHistoryStore::new()
            .with_history(&code(), vec![BuildRecord::known(9, TestCounts::new(5, 0))]);
        let server = ScriptedCiServer::new().with_latest_completed(&code(), Ok(4));
        let sync = synchronizer(store, server);
        sync.sync_project(&code()).await.unwrap();
        assert!(logs_contain("sync.remote_behind"));

        let sync = synchronizer(MemoryHistoryStore::new(), ScriptedCiServer::new());
        sync.sync_project(&code()).await.unwrap_err();
        assert!(logs_contain("sync.aborted"));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_refresh_reports_stale_counts() {
        let store = MemoryHistoryStore::new()
            .with_history(&code(), vec![BuildRecord::known(2, TestCounts::new(5, 0))]);
        let server = ScriptedCiServer::new()
            .with_latest_completed(&code(), Ok(2))
            .with_report(&code(), 2, Ok(TestCounts::new(5, 3)));
        let sync = synchronizer(store, server);

        let outcome = sync.sync_project(&code()).await.unwrap();

        assert_eq!(outcome.added, 0);
        assert!(logs_contain("sync.stale_counts"));
        assert!(logs_contain("merge.skipped"));
    }
}
