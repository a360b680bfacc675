use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::KaskadeError;
use crate::results::LoadTestResult;
use crate::run::config::RunConfig;
use crate::session::model::Request;

/// Everything the worker needs for one run: the validated config plus the
/// active session's request definitions. Written to the worker's stdin as
/// a single JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInput {
    pub target_url: String,
    pub test_duration_seconds: u64,
    pub concurrency: u64,
    pub total_requests: u64,
    pub requests: Vec<Request>,
}

impl WorkerInput {
    pub fn new(config: &RunConfig, requests: Vec<Request>) -> Self {
        Self {
            target_url: config.target_url.clone(),
            test_duration_seconds: config.test_duration_seconds,
            concurrency: config.concurrency,
            total_requests: config.total_requests,
            requests,
        }
    }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Spawns the external load-generation worker and speaks its one-shot
/// stdin/stdout protocol: write one JSON object, read one JSON result.
///
/// Every invocation runs under both a cancellation token and a timeout, so
/// an unresponsive worker can never hang a run forever.
#[derive(Debug, Clone)]
pub struct WorkerLauncher {
    binary: PathBuf,
    timeout: Duration,
}

impl WorkerLauncher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one load test to completion and decode the worker's output.
    pub async fn run(
        &self,
        input: &WorkerInput,
        cancel: &CancellationToken,
    ) -> Result<LoadTestResult, KaskadeError> {
        let payload = serde_json::to_vec(input)?;

        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KaskadeError::Worker {
                message: format!("failed to start worker {}: {e}", self.binary.display()),
                output: String::new(),
            })?;

        // Write the input then close stdin so the worker sees EOF and
        // starts the run.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await.map_err(|e| KaskadeError::Worker {
                message: format!("failed to write worker input: {e}"),
                output: String::new(),
            })?;
        }

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                // kill_on_drop reaps the child once `child` goes out of scope.
                return Err(KaskadeError::Worker {
                    message: "run cancelled".to_string(),
                    output: String::new(),
                });
            }
            outcome = tokio::time::timeout(self.timeout, child.wait_with_output()) => {
                match outcome {
                    Ok(io) => io.map_err(|e| KaskadeError::Worker {
                        message: format!("failed to read worker output: {e}"),
                        output: String::new(),
                    })?,
                    Err(_) => {
                        return Err(KaskadeError::Worker {
                            message: format!(
                                "worker did not finish within {}s",
                                self.timeout.as_secs()
                            ),
                            output: String::new(),
                        });
                    }
                }
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            tracing::debug!(stderr = %stderr, "worker stderr");
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(KaskadeError::Worker {
                message: format!("worker exited with {}", output.status),
                output: stdout,
            });
        }

        parse_output(&stdout)
    }
}

/// Decode the worker's complete stdout as a result. A decode failure is
/// fatal for the run; the raw output rides along in the error for display.
pub fn parse_output(raw: &str) -> Result<LoadTestResult, KaskadeError> {
    serde_json::from_str(raw.trim()).map_err(|e| KaskadeError::Worker {
        message: format!("worker output did not decode: {e}"),
        output: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
