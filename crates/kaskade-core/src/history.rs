//! Access to prior run results stored on the backend.

use tokio::sync::Mutex;

use crate::backend::BackendClient;
use crate::error::KaskadeError;
use crate::results::{LoadTestResult, ResultMetadata};
use crate::session::store::SessionStore;

/// Fetch the stored summary rows for a session, in the backend's ordering
/// (newest first).
pub async fn list_history(
    client: &BackendClient,
    session_id: i64,
    limit: Option<u32>,
) -> Result<Vec<ResultMetadata>, KaskadeError> {
    client.list_results(&session_id.to_string(), limit).await
}

/// Fetch one historical record and publish it into the store exactly like
/// a live run's result, so the same result view renders both.
pub async fn load_history_detail(
    client: &BackendClient,
    store: &Mutex<SessionStore>,
    result_id: i64,
) -> Result<(LoadTestResult, ResultMetadata), KaskadeError> {
    let record = client.get_result(result_id).await?;
    let metadata = record.metadata();
    let result = record.result.into_decoded()?;

    store
        .lock()
        .await
        .set_result(Some(result.clone()), Some(metadata.clone()));

    Ok((result, metadata))
}
