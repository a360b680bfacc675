//! Client for the remote result backend.
//!
//! The backend owns long-term result records and user accounts; this client
//! only speaks its request/response shapes. Authentication is a session
//! cookie handed out by `/login`, so the client keeps a cookie store and is
//! meant to live as long as the user's session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KaskadeError;
use crate::results::{LoadTestResult, ResultMetadata};
use crate::run::config::RunConfig;
use crate::session::store::{SigninForm, SignupForm};

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /benchmarkresult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResultRequest {
    pub user_id: String,
    pub session_id: String,
    pub version: String,
    pub config: RunConfig,
    pub result: LoadTestResult,
}

/// A field the backend delivers either pre-decoded or as a JSON-encoded
/// string. Always normalized through [`MaybeEncoded::into_decoded`] before
/// the value reaches the rest of the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaybeEncoded<T> {
    Decoded(T),
    Raw(String),
}

impl<T: serde::de::DeserializeOwned> MaybeEncoded<T> {
    pub fn into_decoded(self) -> Result<T, KaskadeError> {
        match self {
            MaybeEncoded::Decoded(value) => Ok(value),
            MaybeEncoded::Raw(raw) => Ok(serde_json::from_str(&raw)?),
        }
    }
}

/// One raw record from `GET /benchmarkresult/{id}`. Unlike the listing
/// rows, the detail endpoint uses snake_case keys and may deliver `result`
/// and `config` as encoded strings requiring a second decode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BenchmarkRecord {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub version: String,
    pub success_ratio: f64,
    pub p50_latency: f64,
    pub p95_latency: f64,
    pub throughput: f64,
    pub result: MaybeEncoded<LoadTestResult>,
    #[serde(default)]
    pub config: Option<MaybeEncoded<RunConfig>>,
}

impl BenchmarkRecord {
    /// Project the record's summary fields into the listing-row shape.
    pub fn metadata(&self) -> ResultMetadata {
        ResultMetadata {
            id: self.id,
            user_id: self.user_id.clone(),
            timestamp: self.timestamp,
            session_id: self.session_id.clone(),
            version: self.version.clone(),
            success_ratio: self.success_ratio,
            p50_latency: self.p50_latency,
            p95_latency: self.p95_latency,
            throughput: self.throughput,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ---------------------------------------------------------------------------
// BackendClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = match reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .user_agent(format!("kaskade/{}", env!("CARGO_PKG_VERSION")))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build HTTP client, using defaults");
                reqwest::Client::new()
            }
        };
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<(), KaskadeError> {
        let response = self
            .client
            .post(self.url("/signup"))
            .json(form)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Log in; the session cookie is captured by the client's cookie store
    /// and rides along on every later call.
    pub async fn login(&self, form: &SigninForm) -> Result<User, KaskadeError> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(form)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn logout(&self) -> Result<(), KaskadeError> {
        let response = self.client.post(self.url("/logout")).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> Result<User, KaskadeError> {
        let response = self
            .client
            .put(self.url(&format!("/users/{username}")))
            .json(update)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Store a completed run's result; the backend answers with the
    /// summary row it created.
    pub async fn submit_result(
        &self,
        submission: &SubmitResultRequest,
    ) -> Result<ResultMetadata, KaskadeError> {
        let response = self
            .client
            .post(self.url("/benchmarkresult"))
            .json(submission)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Summary rows for a session, backend ordering preserved.
    pub async fn list_results(
        &self,
        session_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ResultMetadata>, KaskadeError> {
        let mut request = self
            .client
            .get(self.url("/benchmarkresult"))
            .query(&[("sessionId", session_id)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        let response = request.send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn get_result(&self, result_id: i64) -> Result<BenchmarkRecord, KaskadeError> {
        let response = self
            .client
            .get(self.url(&format!("/benchmarkresult/{result_id}")))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Map a non-2xx response to a backend error, preferring the `{error}`
/// body the backend emits over the bare status code.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, KaskadeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("backend returned HTTP {status}"),
    };
    Err(KaskadeError::Backend(message))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
