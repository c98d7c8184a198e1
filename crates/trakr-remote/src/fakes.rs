//! Scripted in-memory CI server (testing only)
//!
//! `ScriptedCiServer` answers from a fixed script and records every call so
//! tests can assert on request order.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use trakr_history::{ProjectCode, TestCounts};

use crate::client::CiServer;
use crate::endpoint::ProjectEndpoint;
use crate::error::RemoteError;
use crate::Result;

/// One request observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LatestCompleted(ProjectCode),
    Latest(ProjectCode),
    TestReport(ProjectCode, u64),
    Trigger(ProjectCode),
}

#[derive(Debug, Default)]
struct Script {
    latest_completed: HashMap<ProjectCode, Result<u64>>,
    latest: HashMap<ProjectCode, Result<u64>>,
    reports: HashMap<(ProjectCode, u64), Result<TestCounts>>,
    trigger_failure: Option<RemoteError>,
}

/// CI server whose answers are scripted per project.
///
/// Builds with no scripted report answer with a 404 server error.
#[derive(Debug, Default)]
pub struct ScriptedCiServer {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedCiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the latest completed build id.
    pub fn with_latest_completed(self, project: &ProjectCode, answer: Result<u64>) -> Self {
        self.script
            .lock()
            .unwrap()
            .latest_completed
            .insert(project.clone(), answer);
        self
    }

    /// Script the latest (possibly running) build id.
    pub fn with_latest(self, project: &ProjectCode, answer: Result<u64>) -> Self {
        self.script
            .lock()
            .unwrap()
            .latest
            .insert(project.clone(), answer);
        self
    }

    /// Script the report of one build.
    pub fn with_report(self, project: &ProjectCode, build: u64, answer: Result<TestCounts>) -> Self {
        self.script
            .lock()
            .unwrap()
            .reports
            .insert((project.clone(), build), answer);
        self
    }

    /// Script the same known report for every build in `builds`.
    pub fn with_reports(
        mut self,
        project: &ProjectCode,
        builds: impl IntoIterator<Item = u64>,
        counts: TestCounts,
    ) -> Self {
        for build in builds {
            self = self.with_report(project, build, Ok(counts));
        }
        self
    }

    /// Make `trigger_build` fail.
    pub fn with_trigger_failure(self, error: RemoteError) -> Self {
        self.script.lock().unwrap().trigger_failure = Some(error);
        self
    }

    /// Calls observed so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Build numbers whose reports were requested, in order.
    pub fn report_requests(&self, project: &ProjectCode) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::TestReport(p, n) if &p == project => Some(n),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unscripted() -> RemoteError {
    RemoteError::Server {
        status: 404,
        reason: "Not Found".to_string(),
    }
}

#[async_trait]
impl CiServer for ScriptedCiServer {
    async fn latest_completed_build_id(&self, project: &ProjectEndpoint) -> Result<u64> {
        self.record(Call::LatestCompleted(project.code.clone()));
        let script = self.script.lock().unwrap();
        script
            .latest_completed
            .get(&project.code)
            .cloned()
            .unwrap_or_else(|| Err(unscripted()))
    }

    async fn latest_build_id(&self, project: &ProjectEndpoint) -> Result<u64> {
        self.record(Call::Latest(project.code.clone()));
        let script = self.script.lock().unwrap();
        script
            .latest
            .get(&project.code)
            .cloned()
            .unwrap_or_else(|| Err(unscripted()))
    }

    async fn test_report(&self, project: &ProjectEndpoint, build_number: u64) -> Result<TestCounts> {
        self.record(Call::TestReport(project.code.clone(), build_number));
        let script = self.script.lock().unwrap();
        script
            .reports
            .get(&(project.code.clone(), build_number))
            .cloned()
            .unwrap_or_else(|| Err(unscripted()))
    }

    async fn trigger_build(&self, project: &ProjectEndpoint) -> Result<()> {
        self.record(Call::Trigger(project.code.clone()));
        if project.build_token.is_none() {
            return Err(RemoteError::MissingToken {
                project: project.code.to_string(),
            });
        }
        match &self.script.lock().unwrap().trigger_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
