use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LoadTestResult
// ---------------------------------------------------------------------------

/// Aggregate metrics for one run, exactly as produced by the worker.
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestResult {
    pub avg_time_ms: f64,
    pub success: u64,
    pub failures: u64,
    /// Latency in ms keyed by percentile (50, 95, 99, ...). JSON map keys
    /// arrive as strings; the ordered map keeps percentile order stable.
    #[serde(default)]
    pub percentile_time_ms: BTreeMap<u32, f64>,
}

impl LoadTestResult {
    /// Total number of requests the worker attempted.
    pub fn total(&self) -> u64 {
        self.success + self.failures
    }

    /// Success ratio as a percentage, or `None` when the run had no samples.
    pub fn success_ratio(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(self.success as f64 / total as f64 * 100.0)
    }

    /// Latency at the given percentile, if the worker reported it.
    pub fn percentile(&self, p: u32) -> Option<f64> {
        self.percentile_time_ms.get(&p).copied()
    }
}

// ---------------------------------------------------------------------------
// ResultMetadata
// ---------------------------------------------------------------------------

/// Backend-assigned summary row for a stored run. Used for history listing
/// without re-fetching the full [`LoadTestResult`] payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub version: String,
    pub success_ratio: f64,
    pub p50_latency: f64,
    pub p95_latency: f64,
    pub throughput: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
