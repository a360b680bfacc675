pub mod config;
pub mod worker;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, SubmitResultRequest};
use crate::error::KaskadeError;
use crate::results::{LoadTestResult, ResultMetadata};
use crate::session::model::HistoryEntry;
use crate::session::store::SessionStore;

pub use config::{validate_draft, RunConfig};
pub use worker::{WorkerInput, WorkerLauncher};

/// Schema version stamped on every result submitted to the backend.
pub const RESULT_SCHEMA_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Run pipeline states
// ---------------------------------------------------------------------------

/// Phase of the run pipeline, observable for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Validating,
    Dispatching,
    AwaitingWorker,
    ParsingOutput,
    SubmittingResult,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::Dispatching => "dispatching",
            RunPhase::AwaitingWorker => "awaiting_worker",
            RunPhase::ParsingOutput => "parsing_output",
            RunPhase::SubmittingResult => "submitting_result",
        };
        write!(f, "{s}")
    }
}

/// Why a run was suppressed rather than executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The run config failed validation; the message is in the store's
    /// validation slice.
    Invalid,
    /// Another run is already outstanding.
    RunInFlight,
    /// The active session changed before the result could be published.
    SessionChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        result: LoadTestResult,
        /// `None` when the backend submission failed; the local result is
        /// still published.
        metadata: Option<ResultMetadata>,
    },
    Skipped(SkipReason),
}

// ---------------------------------------------------------------------------
// execute_run
// ---------------------------------------------------------------------------

/// Run the full pipeline for the given session: validate the store's
/// run-config draft, dispatch to the worker, parse its output, submit the
/// result to the backend, and publish into the store.
///
/// The store lock is held only around state transitions, never across the
/// worker or backend calls. A backend submission failure does not discard
/// the run; the local result is published with no metadata. If the active
/// session changes while the worker is running, the late result is dropped.
pub async fn execute_run(
    store: &Mutex<SessionStore>,
    session_id: i64,
    worker: &WorkerLauncher,
    backend: &BackendClient,
    cancel: &CancellationToken,
) -> Result<RunOutcome, KaskadeError> {
    // Validate and mark the run in flight under one lock, so two
    // concurrent dispatches cannot both pass the gate.
    let (run_config, input, user_id) = {
        let mut store = store.lock().await;

        if store.active_session_id() != Some(session_id) {
            tracing::debug!(session_id, "dispatch ignored, session no longer active");
            return Ok(RunOutcome::Skipped(SkipReason::SessionChanged));
        }

        tracing::debug!(phase = %RunPhase::Validating, session_id, "run pipeline");
        let run_config = match config::validate_draft(store.run_config(), store.user()) {
            Ok(config) => config,
            Err(KaskadeError::Validation(message)) => {
                store.set_validation(false, Some(message));
                return Ok(RunOutcome::Skipped(SkipReason::Invalid));
            }
            Err(other) => return Err(other),
        };
        store.set_validation(true, None);

        if !store.begin_run(session_id) {
            tracing::debug!(session_id, "dispatch suppressed, run already in flight");
            return Ok(RunOutcome::Skipped(SkipReason::RunInFlight));
        }

        let requests = match store.session(session_id) {
            Some(session) => session.requests.clone(),
            None => {
                store.finish_run();
                return Err(KaskadeError::SessionNotFound(session_id.to_string()));
            }
        };
        let user_id = store.user().map(|u| u.id.to_string()).unwrap_or_default();

        let input = WorkerInput::new(&run_config, requests);
        (run_config, input, user_id)
    };

    tracing::debug!(phase = %RunPhase::Dispatching, session_id, "run pipeline");
    let worker_result = worker.run(&input, cancel).await;

    let result = match worker_result {
        Ok(result) => result,
        Err(e) => {
            store.lock().await.finish_run();
            return Err(e);
        }
    };

    tracing::debug!(phase = %RunPhase::SubmittingResult, session_id, "run pipeline");
    let submission = SubmitResultRequest {
        user_id,
        session_id: session_id.to_string(),
        version: RESULT_SCHEMA_VERSION.to_string(),
        config: run_config.clone(),
        result: result.clone(),
    };
    let metadata = match backend.submit_result(&submission).await {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            // The run's numbers must not be lost; only the durable
            // history row is missing.
            tracing::warn!(error = %e, session_id, "result submission failed");
            None
        }
    };

    let mut store = store.lock().await;
    store.finish_run();

    if store.active_session_id() != Some(session_id) {
        tracing::debug!(session_id, "late result dropped, session changed during run");
        return Ok(RunOutcome::Skipped(SkipReason::SessionChanged));
    }

    store.set_result(Some(result.clone()), metadata.clone());
    let entry = HistoryEntry {
        timestamp: Utc::now().timestamp_millis(),
        test_duration: run_config.test_duration_seconds,
        concurrent_users: run_config.concurrency,
        target_throughput: run_config.total_requests as f64
            / run_config.test_duration_seconds as f64,
        num_of_workers: run_config.concurrency,
        result: result.clone(),
    };
    store.record_history(session_id, entry).await?;

    Ok(RunOutcome::Completed { result, metadata })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
