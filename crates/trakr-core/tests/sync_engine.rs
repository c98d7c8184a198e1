//! Synchronization pass tests against the in-memory and filesystem stores.

use std::sync::Arc;

use trakr_core::{
    BuildRecord, FailureKind, FsHistoryStore, HistoryStore, JenkinsClient, ProjectCode,
    ProjectEndpoint, ProjectRegistry, RemoteConfig, RemoteError, SyncAction, SyncError,
    Synchronizer, TestCounts,
};
use trakr_history::fakes::MemoryHistoryStore;
use trakr_remote::fakes::{Call, ScriptedCiServer};

fn code(raw: &str) -> ProjectCode {
    ProjectCode::new(raw).unwrap()
}

fn registry(codes: &[&str]) -> ProjectRegistry {
    let endpoints = codes
        .iter()
        .map(|c| ProjectEndpoint::new(code(c), "http://ci.test", &format!("/job/{}", c)))
        .collect();
    ProjectRegistry::from_endpoints(endpoints, "unused")
}

fn network_down() -> RemoteError {
    RemoteError::Network {
        reason: "connection reset".to_string(),
    }
}

fn known_range(from: u64, to: u64) -> Vec<BuildRecord> {
    (from..=to)
        .rev()
        .map(|n| BuildRecord::known(n, TestCounts::new(20, n % 3)))
        .collect()
}

#[tokio::test]
async fn test_backfill_fetches_oldest_first() {
    let web = code("WEB");
    let store = Arc::new(MemoryHistoryStore::new().with_history(&web, known_range(1, 10)));
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest_completed(&web, Ok(13))
            .with_reports(&web, 11..=13, TestCounts::new(30, 2)),
    );
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server.clone());

    let outcome = sync.sync_project(&web).await.unwrap();

    assert_eq!(outcome.action, SyncAction::Backfill { from: 11, to: 13 });
    assert_eq!(outcome.added, 3);
    assert_eq!(outcome.head.unwrap().build_number, 13);
    assert_eq!(server.report_requests(&web), vec![11, 12, 13]);

    let history = store.load(&web).unwrap();
    assert_eq!(history.len(), 13);
    assert!(history.is_strictly_descending());
    assert_eq!(history.head().unwrap().counts, Some(TestCounts::new(30, 2)));
}

#[tokio::test]
async fn test_failed_report_becomes_unknown_and_pass_continues() {
    let web = code("WEB");
    let store = Arc::new(MemoryHistoryStore::new().with_history(&web, known_range(1, 10)));
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest_completed(&web, Ok(13))
            .with_report(&web, 11, Ok(TestCounts::new(30, 1)))
            .with_report(&web, 12, Err(network_down()))
            .with_report(&web, 13, Ok(TestCounts::new(30, 0))),
    );
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server.clone());

    let outcome = sync.sync_project(&web).await.unwrap();
    assert_eq!(outcome.added, 3);
    assert_eq!(server.report_requests(&web), vec![11, 12, 13]);

    let history = store.load(&web).unwrap();
    assert!(history.get(12).unwrap().is_unknown());
    assert_eq!(history.head().unwrap().build_number, 13);
    assert!(!history.head().unwrap().is_unknown());
}

#[tokio::test]
async fn test_fresh_populate() {
    let web = code("WEB");
    let store = Arc::new(MemoryHistoryStore::new());
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest_completed(&web, Ok(3))
            .with_reports(&web, 1..=3, TestCounts::new(8, 0)),
    );
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server.clone());

    let outcome = sync.sync_project(&web).await.unwrap();

    assert_eq!(outcome.action, SyncAction::FreshPopulate);
    assert_eq!(outcome.remote_latest, 3);
    let numbers: Vec<u64> = store
        .load(&web)
        .unwrap()
        .iter()
        .map(|r| r.build_number)
        .collect();
    assert_eq!(numbers, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_latest_build_failure_writes_nothing_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let web = code("WEB");
    let fs_store = FsHistoryStore::new(dir.path());
    let store = Arc::new(FsHistoryStore::new(dir.path()));
    let server = Arc::new(ScriptedCiServer::new().with_latest_completed(
        &web,
        Err(RemoteError::Server {
            status: 500,
            reason: "Internal Server Error".to_string(),
        }),
    ));
    let sync = Synchronizer::new(registry(&["WEB"]), store, server.clone());

    let err = sync.sync_project(&web).await.unwrap_err();

    assert!(matches!(err, SyncError::LatestBuild(RemoteError::Server { status: 500, .. })));
    assert!(!err.needs_operator());
    assert!(!fs_store.history_path(&web).exists());
    assert!(server.report_requests(&web).is_empty());
}

#[tokio::test]
async fn test_in_sync_refresh_is_a_no_op() {
    let web = code("WEB");
    let store = Arc::new(MemoryHistoryStore::new().with_history(&web, known_range(1, 5)));
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest_completed(&web, Ok(5))
            .with_report(&web, 5, Ok(TestCounts::new(99, 9))),
    );
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server.clone());
    let before = store.load(&web).unwrap();

    let outcome = sync.sync_project(&web).await.unwrap();

    assert_eq!(outcome.action, SyncAction::Refresh);
    assert_eq!(outcome.added, 0);
    assert_eq!(server.report_requests(&web), vec![5]);
    assert_eq!(store.load(&web).unwrap(), before);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_remote_behind_changes_nothing() {
    let web = code("WEB");
    let store = Arc::new(MemoryHistoryStore::new().with_history(&web, known_range(1, 10)));
    let server = Arc::new(ScriptedCiServer::new().with_latest_completed(&web, Ok(7)));
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server.clone());

    let outcome = sync.sync_project(&web).await.unwrap();

    assert_eq!(outcome.action, SyncAction::RemoteBehind);
    assert_eq!(outcome.head.unwrap().build_number, 10);
    assert!(server.report_requests(&web).is_empty());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_sync_all_continues_after_failure() {
    let (web, api, docs) = (code("WEB"), code("API"), code("DOCS"));
    let store = Arc::new(MemoryHistoryStore::new().with_corrupt(&docs, "truncated"));
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest_completed(&web, Err(network_down()))
            .with_latest_completed(&api, Ok(2))
            .with_reports(&api, 1..=2, TestCounts::new(4, 0))
            .with_latest_completed(&docs, Ok(1)),
    );
    let sync = Synchronizer::new(registry(&["WEB", "API", "DOCS"]), store.clone(), server.clone());

    let results = sync.sync_all(&[web.clone(), api.clone(), docs.clone()]).await;

    assert_eq!(results.len(), 3);
    assert!(matches!(&results[0].1, Err(SyncError::LatestBuild(RemoteError::Network { .. }))));
    assert_eq!(results[1].1.as_ref().unwrap().added, 2);
    let docs_err = results[2].1.as_ref().unwrap_err();
    assert!(docs_err.needs_operator());
    assert!(!server.calls().contains(&Call::LatestCompleted(docs.clone())));

    assert!(store.load(&web).unwrap().is_empty());
    assert_eq!(store.load(&api).unwrap().len(), 2);
}

#[tokio::test]
async fn test_repeated_passes_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let web = code("WEB");
    let store = Arc::new(FsHistoryStore::new(dir.path()));
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest_completed(&web, Ok(4))
            .with_reports(&web, 1..=4, TestCounts::new(12, 1)),
    );
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server);

    let first = sync.sync_project(&web).await.unwrap();
    let after_first = std::fs::read(store.history_path(&web)).unwrap();
    let second = sync.sync_project(&web).await.unwrap();
    let after_second = std::fs::read(store.history_path(&web)).unwrap();

    assert_eq!(first.added, 4);
    assert_eq!(second.action, SyncAction::Refresh);
    assert_eq!(second.added, 0);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_trigger_requires_token() {
    let web = code("WEB");
    let server = Arc::new(ScriptedCiServer::new());
    let with_token = ProjectRegistry::from_endpoints(
        vec![ProjectEndpoint::new(web.clone(), "http://ci.test", "/job/web").with_token("t0k")],
        "unused",
    );
    let sync = Synchronizer::new(with_token, Arc::new(MemoryHistoryStore::new()), server.clone());
    sync.trigger(&web, "manual").await.unwrap();
    assert_eq!(server.calls(), vec![Call::Trigger(web.clone())]);

    let sync = Synchronizer::new(
        registry(&["WEB"]),
        Arc::new(MemoryHistoryStore::new()),
        Arc::new(ScriptedCiServer::new()),
    );
    let err = sync.trigger(&web, "manual").await.unwrap_err();
    assert!(matches!(err, SyncError::Trigger(RemoteError::MissingToken { .. })));
}

#[tokio::test]
async fn test_probe_reports_both_ids() {
    let web = code("WEB");
    let store = Arc::new(MemoryHistoryStore::new().with_history(&web, known_range(1, 4)));
    let server = Arc::new(
        ScriptedCiServer::new()
            .with_latest(&web, Ok(6))
            .with_latest_completed(&web, Ok(5)),
    );
    let sync = Synchronizer::new(registry(&["WEB"]), store.clone(), server);

    let report = sync.probe(&web).await.unwrap();

    assert_eq!(report.local_head, Some(4));
    assert_eq!(report.latest, Ok(6));
    assert_eq!(report.latest_completed, Ok(5));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_unusable_server_url_needs_operator() {
    let web = code("WEB");
    let registry = ProjectRegistry::from_endpoints(
        vec![ProjectEndpoint::new(web.clone(), "not a url", "/job/web")],
        "unused",
    );
    let store = Arc::new(MemoryHistoryStore::new());
    let client = JenkinsClient::new(RemoteConfig::default().with_timeout_secs(2)).unwrap();
    let sync = Synchronizer::new(registry, store.clone(), Arc::new(client));

    let err = sync.sync_project(&web).await.unwrap_err();

    assert!(matches!(err, SyncError::LatestBuild(RemoteError::InvalidUrl(_))));
    assert_eq!(err.remote_kind(), Some(FailureKind::Other));
    assert!(err.needs_operator());
    assert!(!store.exists(&web).unwrap());
}
