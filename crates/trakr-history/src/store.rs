//! History storage trait and the filesystem backend.
//!
//! Layout: one JSON document per project at `<root>/<code>.json`.
//! Every write goes through a temp file in the same directory followed by an
//! atomic rename, so a reader (or a crash) only ever sees a complete history.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::HistoryError;
use crate::history::History;
use crate::record::{BuildRecord, ProjectCode};
use crate::Result;

/// Per-project build history persistence.
///
/// Guarantees:
/// - `load` of a never-written project returns an empty history.
/// - `merge` prepends unless the record repeats the head's build number.
/// - A store that cannot be decoded is reported, never rewritten.
pub trait HistoryStore: Send + Sync {
    /// Load the persisted history (empty if none exists).
    fn load(&self, project: &ProjectCode) -> Result<History>;

    /// Merge one record, returning whether a write occurred.
    fn merge(&self, project: &ProjectCode, record: BuildRecord) -> Result<bool>;

    /// Whether a history has ever been persisted for `project`.
    fn exists(&self, project: &ProjectCode) -> Result<bool>;

    /// Full ordered history for presentation consumers.
    fn read_all(&self, project: &ProjectCode) -> Result<History> {
        self.load(project)
    }
}

/// Shared merge rule for store implementations.
pub(crate) fn merge_into(project: &ProjectCode, history: &mut History, record: BuildRecord) -> bool {
    if let Some(head) = history.head() {
        if record.build_number < head.build_number {
            warn!(
                project = %project,
                build_number = record.build_number,
                head = head.build_number,
                "Merging build older than current head"
            );
        }
    }
    history.prepend(record)
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryDocument {
    project: ProjectCode,
    builds: History,
}

/// Filesystem-backed history store.
#[derive(Debug, Clone)]
pub struct FsHistoryStore {
    root: PathBuf,
}

impl FsHistoryStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the history document for `project`.
    pub fn history_path(&self, project: &ProjectCode) -> PathBuf {
        self.root.join(format!("{}.json", project))
    }

    fn persist(&self, project: &ProjectCode, history: &History) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let document = HistoryDocument {
            project: project.clone(),
            builds: history.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| HistoryError::Encode(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.history_path(project))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

impl HistoryStore for FsHistoryStore {
    fn load(&self, project: &ProjectCode) -> Result<History> {
        let path = self.history_path(project);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(project = %project, "No persisted history yet");
                return Ok(History::new());
            }
            Err(e) => return Err(HistoryError::Io(e)),
        };

        let document: HistoryDocument =
            serde_json::from_slice(&bytes).map_err(|e| HistoryError::Corrupt {
                project: project.to_string(),
                reason: e.to_string(),
            })?;

        if &document.project != project {
            return Err(HistoryError::Corrupt {
                project: project.to_string(),
                reason: format!("document belongs to project '{}'", document.project),
            });
        }

        Ok(document.builds)
    }

    fn merge(&self, project: &ProjectCode, record: BuildRecord) -> Result<bool> {
        let mut history = self.load(project)?;
        if !merge_into(project, &mut history, record) {
            return Ok(false);
        }
        self.persist(project, &history)?;
        Ok(true)
    }

    fn exists(&self, project: &ProjectCode) -> Result<bool> {
        Ok(self.history_path(project).try_exists()?)
    }
}
