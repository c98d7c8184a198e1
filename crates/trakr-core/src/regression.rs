//! Failure-count regression between the two most recent builds.

use trakr_history::History;

/// The head build failed noticeably more tests than the build before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regression {
    pub build_number: u64,
    pub previous_build: u64,
    pub failed_now: u64,
    pub failed_before: u64,
}

impl Regression {
    pub fn increase(&self) -> u64 {
        self.failed_now - self.failed_before
    }

    /// Short reason used when requesting a rebuild.
    pub fn describe(&self) -> String {
        format!(
            "build {} failed {} more tests than build {}",
            self.build_number,
            self.increase(),
            self.previous_build
        )
    }
}

/// Compare the head against the previous record.
///
/// Reports a regression when the failed count grew by more than `threshold`.
/// Records with unknown counts never count as a regression.
pub fn detect(history: &History, threshold: u64) -> Option<Regression> {
    let head = history.head()?;
    let previous = history.previous()?;
    let now = head.counts?;
    let before = previous.counts?;

    if now.failed_tests > before.failed_tests
        && now.failed_tests - before.failed_tests > threshold
    {
        Some(Regression {
            build_number: head.build_number,
            previous_build: previous.build_number,
            failed_now: now.failed_tests,
            failed_before: before.failed_tests,
        })
    } else {
        None
    }
}
