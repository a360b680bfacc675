use serde::{Deserialize, Serialize};

use crate::results::LoadTestResult;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// KeyValue
// ---------------------------------------------------------------------------

/// An ordered header or query-parameter pair. Duplicate keys are allowed,
/// so these are kept as a sequence rather than a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One HTTP call definition belonging to a session.
///
/// Invariant: `params` is always the decoded projection of the query string
/// in `url`; [`crate::session::sync`] keeps the two consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Unique within the owning session; immutable after creation.
    pub request_id: i64,
    pub request_name: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_body: Option<String>,
    #[serde(default)]
    pub headers: Vec<KeyValue>,
    #[serde(default)]
    pub params: Vec<KeyValue>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Request {
    /// Create a new request with default fields, as shown to the user
    /// before any editing.
    pub fn new(request_id: i64) -> Self {
        Self {
            request_id,
            request_name: "New Request".to_string(),
            url: String::new(),
            method: HttpMethod::Get,
            req_body: None,
            headers: Vec::new(),
            params: Vec::new(),
            content_type: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// An immutable, append-only record of one past run. Created only as a side
/// effect of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Completion time in epoch milliseconds.
    pub timestamp: i64,
    pub test_duration: u64,
    pub concurrent_users: u64,
    pub target_throughput: f64,
    pub num_of_workers: u64,
    pub result: LoadTestResult,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A named, persisted collection of HTTP request definitions and past run
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Creation timestamp in epoch milliseconds; immutable after creation.
    pub session_id: i64,
    pub session_name: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub created_by: String,
    pub created_on: i64,
    pub last_modified: i64,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Session {
    /// Create a new session with default fields. `created_on` and
    /// `last_modified` start equal to the id, which is itself the creation
    /// timestamp.
    pub fn new(session_id: i64, created_by: impl Into<String>) -> Self {
        Self {
            session_id,
            session_name: "New Session".to_string(),
            overview: String::new(),
            created_by: created_by.into(),
            created_on: session_id,
            last_modified: session_id,
            servers: Vec::new(),
            requests: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Record that the session (or one of its requests) was mutated.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_modified = now_ms;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
