//! Typed response schemas of the Jenkins JSON API.
//!
//! Each endpoint gets its own struct; anything the server sends that does not
//! fit is turned into a `RemoteError::Server` by the client.

use serde::Deserialize;
use trakr_history::TestCounts;

/// `.../lastCompletedBuild/api/json?tree=id` and `.../lastBuild/api/json?tree=id`.
///
/// Jenkins encodes the build id as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildIdResponse {
    pub id: String,
}

impl BuildIdResponse {
    pub const TREE: &'static str = "id";

    /// Parse the string-encoded id.
    pub fn build_number(&self) -> Result<u64, String> {
        self.id
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("build id {:?} is not a non-negative integer", self.id))
    }
}

/// `.../{n}/testReport/api/json?tree=failCount,passCount,duration,skipCount`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReportResponse {
    pub fail_count: u64,
    pub pass_count: u64,
    #[serde(default)]
    pub skip_count: u64,
    #[serde(default)]
    pub duration: f64,
}

impl TestReportResponse {
    pub const TREE: &'static str = "failCount,passCount,duration,skipCount";

    /// Executed-test counts; skipped tests are left out of the total.
    pub fn counts(&self) -> TestCounts {
        TestCounts::from_report(self.pass_count, self.fail_count)
    }
}
