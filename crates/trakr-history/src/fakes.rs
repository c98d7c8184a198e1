//! In-memory fake for the history store (testing only)
//!
//! `MemoryHistoryStore` satisfies the `HistoryStore` contract without touching
//! the filesystem and counts writes so tests can assert on idempotence.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::HistoryError;
use crate::history::History;
use crate::record::{BuildRecord, ProjectCode};
use crate::store::{merge_into, HistoryStore};
use crate::Result;

#[derive(Debug, Default)]
struct Inner {
    histories: HashMap<ProjectCode, History>,
    corrupt: HashMap<ProjectCode, String>,
    writes: usize,
}

/// In-memory history store backed by a `HashMap<ProjectCode, History>`.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    inner: Mutex<Inner>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project's history directly.
    pub fn with_history(self, project: &ProjectCode, records: Vec<BuildRecord>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .histories
            .insert(project.clone(), History::from_records(records));
        self
    }

    /// Make every access to `project` fail as an undecodable store.
    pub fn with_corrupt(self, project: &ProjectCode, reason: &str) -> Self {
        self.inner
            .lock()
            .unwrap()
            .corrupt
            .insert(project.clone(), reason.to_string());
        self
    }

    /// Number of merges that resulted in a write.
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    fn check_corrupt(inner: &Inner, project: &ProjectCode) -> Result<()> {
        match inner.corrupt.get(project) {
            Some(reason) => Err(HistoryError::Corrupt {
                project: project.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self, project: &ProjectCode) -> Result<History> {
        let inner = self.inner.lock().unwrap();
        Self::check_corrupt(&inner, project)?;
        Ok(inner.histories.get(project).cloned().unwrap_or_default())
    }

    fn merge(&self, project: &ProjectCode, record: BuildRecord) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_corrupt(&inner, project)?;
        let history = inner.histories.entry(project.clone()).or_default();
        let wrote = merge_into(project, history, record);
        if wrote {
            inner.writes += 1;
        }
        Ok(wrote)
    }

    fn exists(&self, project: &ProjectCode) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.histories.contains_key(project) || inner.corrupt.contains_key(project))
    }
}
