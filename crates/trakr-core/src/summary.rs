//! Console rendering of sync results and stored histories.
//!
//! Unknown results never fail the invocation; they render as `???`.

use std::fmt::Write as _;

use chrono::Local;
use trakr_history::{BuildRecord, History, ProjectCode, TestCounts};
use trakr_remote::FailureKind;

use crate::error::SyncError;
use crate::sync::SyncOutcome;

const RULE: &str = "=-=-=-=-=-=-=-=-=-=-=-=-=-=-=";

/// What is known about a project's latest build.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryStatus {
    Known(TestCounts),
    /// Counts unavailable; carries the failure kind when one is known.
    Unknown(Option<FailureKind>),
}

/// Console summary block for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub project: ProjectCode,
    pub build_number: Option<u64>,
    pub status: SummaryStatus,
}

impl ProjectSummary {
    fn from_head(project: &ProjectCode, head: Option<&BuildRecord>) -> Self {
        ProjectSummary {
            project: project.clone(),
            build_number: head.map(|r| r.build_number),
            status: match head.and_then(|r| r.counts) {
                Some(counts) => SummaryStatus::Known(counts),
                None => SummaryStatus::Unknown(None),
            },
        }
    }

    /// Summary of the head of a stored history.
    pub fn from_history(project: &ProjectCode, history: &History) -> Self {
        Self::from_head(project, history.head())
    }

    /// Summary of a synchronization result.
    pub fn from_sync(project: &ProjectCode, result: &Result<SyncOutcome, SyncError>) -> Self {
        match result {
            Ok(outcome) => Self::from_head(project, outcome.head.as_ref()),
            Err(err) => ProjectSummary {
                project: project.clone(),
                build_number: None,
                status: SummaryStatus::Unknown(err.remote_kind()),
            },
        }
    }

    /// Render the block the way the console shows it.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let header = match &self.status {
            SummaryStatus::Unknown(Some(FailureKind::Server)) => banner("HTTP"),
            SummaryStatus::Unknown(Some(FailureKind::Network)) => banner("NETWORK"),
            _ => RULE.to_string(),
        };
        let build = self
            .build_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "???".to_string());

        let _ = writeln!(out, "{}", header);
        let _ = writeln!(out, "Project Code: {}", self.project);
        let _ = writeln!(out, "Build: {}", build);
        match &self.status {
            SummaryStatus::Known(counts) => {
                let _ = writeln!(out, "Total Tests: {}", counts.total_tests);
                let _ = writeln!(out, "Failed Tests: {}", counts.failed_tests);
                let _ = writeln!(out, "Fail Percentage: {:.2}%", counts.fail_percentage());
            }
            SummaryStatus::Unknown(_) => {
                let _ = writeln!(out, "Total Tests: ???");
                let _ = writeln!(out, "Failed Tests: ???");
                let _ = writeln!(out, "Fail Percentage: ???%");
            }
        }
        let _ = writeln!(out, "{}", RULE);
        out
    }
}

fn banner(label: &str) -> String {
    let side = RULE.len().saturating_sub(label.len()) / 2;
    format!("{}{}{}", &RULE[..side], label, &RULE[..side])
}

/// One line per stored record, most recent first.
pub fn render_history(project: &ProjectCode, history: &History) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} builds, generated at {})",
        project,
        history.len(),
        Local::now().format("%Y-%m-%d %H:%M")
    );
    for record in history {
        let _ = writeln!(out, "{}", render_record(record));
    }
    out
}

/// `#13  total=20  failed=4  (20.00%)`, or `???` for unknown counts.
pub fn render_record(record: &BuildRecord) -> String {
    match record.counts {
        Some(counts) => format!(
            "#{:<6} total={:<6} failed={:<6} ({:.2}%)",
            record.build_number,
            counts.total_tests,
            counts.failed_tests,
            counts.fail_percentage()
        ),
        None => format!(
            "#{:<6} total={:<6} failed={:<6} (???%)",
            record.build_number, "???", "???"
        ),
    }
}
