//! The audit layer appends one plain line per event to the configured file.
//!
//! Lives in its own test binary: it installs the global subscriber.

use trakr_core::events::{emit_merge_performed, emit_sync_finished};
use trakr_core::{init_tracing, BuildRecord, ProjectCode, TestCounts};

#[test]
fn test_audit_log_receives_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trakr-audit.log");
    std::fs::write(&path, "earlier line\n").unwrap();

    init_tracing(false, tracing::Level::INFO, Some(&path)).unwrap();

    let web = ProjectCode::new("WEB").unwrap();
    emit_merge_performed(&web, &BuildRecord::known(7, TestCounts::new(10, 2)));
    emit_sync_finished(&web, "backfill", 1, Some(7));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "earlier line", "audit log is appended, not truncated");
    assert!(lines.iter().any(|l| l.contains("merge.performed") && l.contains("build_number=7")));
    assert!(lines.iter().any(|l| l.contains("sync.finished") && l.contains("project=WEB")));
    assert!(!content.contains("\u{1b}["), "no ANSI escapes in the audit log");
}
