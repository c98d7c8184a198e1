//! Ordered build timeline of one project.

use serde::{Deserialize, Serialize};

use crate::record::BuildRecord;

/// Build records of one project, most recent first.
///
/// Invariants:
/// - build numbers are unique
/// - records are sorted strictly descending by build number
/// - index 0 (the head) is the most recently synchronized build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<BuildRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap records that are already in storage order.
    pub fn from_records(records: Vec<BuildRecord>) -> Self {
        Self { records }
    }

    /// Whether build numbers are unique and strictly descending.
    pub fn is_strictly_descending(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].build_number > pair[1].build_number)
    }

    /// Most recent record.
    pub fn head(&self) -> Option<&BuildRecord> {
        self.records.first()
    }

    /// Record directly before the head.
    pub fn previous(&self) -> Option<&BuildRecord> {
        self.records.get(1)
    }

    pub fn get(&self, build_number: u64) -> Option<&BuildRecord> {
        self.records
            .iter()
            .find(|r| r.build_number == build_number)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[BuildRecord] {
        &self.records
    }

    /// Prepend `record` unless it repeats the head's build number.
    ///
    /// Returns whether the history changed. Older build numbers are accepted;
    /// callers only merge records that are causally newer than the head.
    pub fn prepend(&mut self, record: BuildRecord) -> bool {
        match self.head() {
            Some(head) if head.build_number == record.build_number => false,
            _ => {
                self.records.insert(0, record);
                true
            }
        }
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a BuildRecord;
    type IntoIter = std::slice::Iter<'a, BuildRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
