//! Build records and project identity.

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// Placeholder written in place of counts the server could not provide.
pub const UNKNOWN_COUNT: i64 = -1;

/// Identifier of a tracked project.
///
/// Doubles as the on-disk key of the project's history, so it is restricted
/// to ASCII alphanumerics, `-`, `_` and `.` and may not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectCode(String);

impl ProjectCode {
    /// Validate and wrap a project code.
    pub fn new(code: impl Into<String>) -> Result<Self, HistoryError> {
        let code = code.into();
        let valid_chars = code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if code.is_empty() || code.starts_with('.') || !valid_chars {
            return Err(HistoryError::InvalidProjectCode(code));
        }
        Ok(ProjectCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectCode {
    type Error = HistoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ProjectCode::new(s)
    }
}

impl From<ProjectCode> for String {
    fn from(code: ProjectCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for ProjectCode {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectCode::new(s)
    }
}

impl std::fmt::Display for ProjectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Test counts of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCounts {
    /// Tests executed (passed + failed; skipped tests are not counted).
    pub total_tests: u64,
    /// Tests that failed.
    pub failed_tests: u64,
}

impl TestCounts {
    pub fn new(total_tests: u64, failed_tests: u64) -> Self {
        Self {
            total_tests,
            failed_tests,
        }
    }

    /// Derive counts from a test report's pass/fail tallies.
    pub fn from_report(pass_count: u64, fail_count: u64) -> Self {
        Self::new(pass_count + fail_count, fail_count)
    }

    /// Percentage of executed tests that failed; 0.0 when nothing ran.
    pub fn fail_percentage(&self) -> f64 {
        if self.total_tests == 0 {
            return 0.0;
        }
        self.failed_tests as f64 / self.total_tests as f64 * 100.0
    }
}

/// One observation of a build's outcome.
///
/// `counts` is `None` when the build's report could not be fetched; such a
/// record keeps the timeline contiguous without claiming any result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "StoredRecord")]
pub struct BuildRecord {
    pub build_number: u64,
    pub counts: Option<TestCounts>,
}

impl BuildRecord {
    /// Record with known test counts.
    pub fn known(build_number: u64, counts: TestCounts) -> Self {
        Self {
            build_number,
            counts: Some(counts),
        }
    }

    /// Record for a build whose report could not be fetched.
    pub fn unknown(build_number: u64) -> Self {
        Self {
            build_number,
            counts: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.counts.is_none()
    }
}

/// On-disk shape of a [`BuildRecord`]. Unknown counts become `-1`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    build_number: u64,
    total_tests: i64,
    failed_tests: i64,
}

impl TryFrom<BuildRecord> for StoredRecord {
    type Error = String;

    fn try_from(record: BuildRecord) -> Result<Self, Self::Error> {
        let (total_tests, failed_tests) = match record.counts {
            Some(c) => {
                let encode = |count: u64| {
                    i64::try_from(count).map_err(|_| {
                        format!(
                            "build {} count {} does not fit the stored range",
                            record.build_number, count
                        )
                    })
                };
                (encode(c.total_tests)?, encode(c.failed_tests)?)
            }
            None => (UNKNOWN_COUNT, UNKNOWN_COUNT),
        };
        Ok(StoredRecord {
            build_number: record.build_number,
            total_tests,
            failed_tests,
        })
    }
}

impl Serialize for BuildRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StoredRecord::try_from(*self)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl TryFrom<StoredRecord> for BuildRecord {
    type Error = String;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let counts = match (stored.total_tests, stored.failed_tests) {
            (UNKNOWN_COUNT, UNKNOWN_COUNT) => None,
            (total, failed) if total >= 0 && failed >= 0 => {
                Some(TestCounts::new(total as u64, failed as u64))
            }
            (total, failed) => {
                return Err(format!(
                    "build {} has invalid counts (total={}, failed={})",
                    stored.build_number, total, failed
                ))
            }
        };
        Ok(BuildRecord {
            build_number: stored.build_number,
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_code_accepts_simple_codes() {
        for code in ["WEB", "api-tests", "mobile_ios", "v2.core"] {
            assert!(ProjectCode::new(code).is_ok(), "{code} should be valid");
        }
    }

    #[test]
    fn test_project_code_rejects_path_like_codes() {
        for code in ["", "../etc", ".hidden", "a/b", "with space"] {
            let err = ProjectCode::new(code).unwrap_err();
            assert!(matches!(err, HistoryError::InvalidProjectCode(_)));
        }
    }

    #[test]
    fn test_fail_percentage_from_report() {
        let counts = TestCounts::from_report(16, 4);
        assert_eq!(counts.total_tests, 20);
        assert_eq!(counts.failed_tests, 4);
        assert_eq!(format!("{:.2}", counts.fail_percentage()), "20.00");
    }

    #[test]
    fn test_fail_percentage_no_tests() {
        assert_eq!(TestCounts::new(0, 0).fail_percentage(), 0.0);
    }

    #[test]
    fn test_unknown_record_encodes_placeholders() {
        let json = serde_json::to_value(BuildRecord::unknown(12)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"build_number": 12, "total_tests": -1, "failed_tests": -1})
        );
    }

    #[test]
    fn test_placeholders_decode_as_unknown() {
        let record: BuildRecord = serde_json::from_str(
            r#"{"build_number": 7, "total_tests": -1, "failed_tests": -1}"#,
        )
        .unwrap();
        assert!(record.is_unknown());
        assert_eq!(record.build_number, 7);
    }

    #[test]
    fn test_oversized_counts_fail_to_encode() {
        let record = BuildRecord::known(4, TestCounts::new(u64::MAX, 0));
        let err = serde_json::to_value(record).unwrap_err();
        assert!(err.to_string().contains("does not fit"));

        let largest = BuildRecord::known(4, TestCounts::new(i64::MAX as u64, 1));
        let json = serde_json::to_string(&largest).unwrap();
        assert_eq!(serde_json::from_str::<BuildRecord>(&json).unwrap(), largest);
    }

    #[test]
    fn test_other_negative_counts_rejected() {
        let result: Result<BuildRecord, _> = serde_json::from_str(
            r#"{"build_number": 7, "total_tests": -2, "failed_tests": -2}"#,
        );
        assert!(result.is_err());
    }
}
