//! Testcase rows, status enum and query result payloads

use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;

/// Stored status code. The integer ordering is load-bearing:
/// `MIN(status)` over a group yields the worst status present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[repr(i32)]
pub enum TestcaseStatus {
    Error = 0,
    Fail = 1,
    Pass = 2,
    Skip = 3,
}

impl TestcaseStatus {
    /// Canonical wire strings accepted by ingress and the query DSL.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "pass" => Some(TestcaseStatus::Pass),
            "fail" => Some(TestcaseStatus::Fail),
            "error" => Some(TestcaseStatus::Error),
            "skip" => Some(TestcaseStatus::Skip),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

// Responses report the integer code, not the wire string.
impl Serialize for TestcaseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

/// Ingress-side status representation (`"pass" | "fail" | "error" | "skip"`).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusWire {
    Pass,
    Fail,
    Error,
    Skip,
}

impl From<StatusWire> for TestcaseStatus {
    fn from(status: StatusWire) -> Self {
        match status {
            StatusWire::Pass => TestcaseStatus::Pass,
            StatusWire::Fail => TestcaseStatus::Fail,
            StatusWire::Error => TestcaseStatus::Error,
            StatusWire::Skip => TestcaseStatus::Skip,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TestcaseRow {
    pub id: String,
    pub status: TestcaseStatus,
    pub name: String,
    pub classname: Option<String>,
    pub file: Option<String>,
    pub testsuite: Option<String>,
    pub output: Option<String>,
    pub baggage: Option<String>,
    pub session_id: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert payload for one ingress testcase; ids and timestamps are
/// assigned by the storage layer.
#[derive(Debug, Clone)]
pub struct NewTestcase {
    pub session_id: String,
    pub user_id: String,
    pub status: TestcaseStatus,
    pub name: String,
    pub classname: Option<String>,
    pub file: Option<String>,
    pub testsuite: Option<String>,
    pub output: Option<String>,
    pub baggage: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestcaseResponse {
    pub id: String,
    pub status: TestcaseStatus,
    pub name: String,
    pub classname: Option<String>,
    pub file: Option<String>,
    pub testsuite: Option<String>,
    pub output: Option<String>,
    pub baggage: Option<serde_json::Value>,
    pub session_id: String,
    pub created_at: String,
}

impl From<TestcaseRow> for TestcaseResponse {
    fn from(row: TestcaseRow) -> Self {
        TestcaseResponse {
            id: row.id,
            status: row.status,
            name: row.name,
            classname: row.classname,
            file: row.file,
            testsuite: row.testsuite,
            output: row.output,
            baggage: row.baggage.and_then(|raw| serde_json::from_str(&raw).ok()),
            session_id: row.session_id,
            created_at: row.created_at,
        }
    }
}

/// Testcase page with the worst status over the full (unpaginated) result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestcasePage {
    pub items: Vec<TestcaseResponse>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
    pub aggregated_status: Option<TestcaseStatus>,
}

/// One row of a grouping query: the group column values in token order
/// plus the `MIN(status)` roll-up within the group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupItem {
    pub columns: Vec<Option<String>>,
    pub status: TestcaseStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPage {
    pub items: Vec<GroupItem>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
    pub header: Option<Vec<String>>,
    pub aggregated_status: Option<TestcaseStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryValidationResponse {
    pub is_grouping: bool,
}
