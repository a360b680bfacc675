use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::backend::User;
use crate::error::KaskadeError;
use crate::results::{LoadTestResult, ResultMetadata};
use crate::session::io::DataFile;
use crate::session::model::{HistoryEntry, HttpMethod, KeyValue, Request, Session};
use crate::session::sync;

// ---------------------------------------------------------------------------
// Transient state slices
// ---------------------------------------------------------------------------

/// Outcome of the last run-config validation attempt.
///
/// `flag` flips on every attempt so downstream consumers can react to a
/// re-validation even when `valid` itself did not change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationState {
    pub valid: bool,
    pub flag: bool,
    pub error: Option<String>,
}

/// Raw run-config form fields as the user typed them. Numeric fields stay
/// strings until validation, so inputs like `"3.5"` can be rejected with a
/// precise message instead of being silently truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfigDraft {
    pub target_url: String,
    pub test_duration: String,
    pub concurrency: String,
    pub total_requests: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninForm {
    pub username: String,
    pub password: String,
}

/// Partial update for a request; `None` leaves a field untouched. The
/// double-`Option` fields distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    pub request_name: Option<String>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub req_body: Option<Option<String>>,
    pub headers: Option<Vec<KeyValue>>,
    pub params: Option<Vec<KeyValue>>,
    pub content_type: Option<Option<String>>,
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// The single authoritative in-memory snapshot of the application state:
/// the session collection plus transient workflow state (run-config draft,
/// validation, current result, auth).
///
/// Mutation happens only through the named operations below. Every durable
/// operation ends by rewriting the whole session document through the
/// bridge; transient operations never touch disk. All operations take
/// `&mut self`, so callers serialize mutations by construction.
#[derive(Debug)]
pub struct SessionStore {
    datafile: DataFile,
    sessions: Vec<Session>,
    active_session_id: Option<i64>,
    run_config: RunConfigDraft,
    validation: ValidationState,
    current_result: Option<LoadTestResult>,
    current_result_metadata: Option<ResultMetadata>,
    run_in_flight: Option<i64>,
    user: Option<User>,
    signup_form: SignupForm,
    signin_form: SigninForm,
    signup_error: Option<String>,
    signin_error: Option<String>,
    last_issued_id: i64,
}

impl SessionStore {
    /// Load the session collection through the bridge and build a store
    /// around it.
    pub async fn open(datafile: DataFile) -> Result<Self, KaskadeError> {
        let sessions = datafile.load().await?;

        // Seed the id watermark from everything already on disk so fresh
        // ids can never collide with loaded ones.
        let last_issued_id = sessions
            .iter()
            .flat_map(|s| {
                std::iter::once(s.session_id).chain(s.requests.iter().map(|r| r.request_id))
            })
            .max()
            .unwrap_or(0);

        Ok(Self {
            datafile,
            sessions,
            active_session_id: None,
            run_config: RunConfigDraft::default(),
            validation: ValidationState::default(),
            current_result: None,
            current_result_metadata: None,
            run_in_flight: None,
            user: None,
            signup_form: SignupForm::default(),
            signin_form: SigninForm::default(),
            signup_error: None,
            signin_error: None,
            last_issued_id,
        })
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn session(&self, session_id: i64) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    pub fn active_session_id(&self) -> Option<i64> {
        self.active_session_id
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active_session_id.and_then(|id| self.session(id))
    }

    pub fn run_config(&self) -> &RunConfigDraft {
        &self.run_config
    }

    pub fn validation(&self) -> &ValidationState {
        &self.validation
    }

    pub fn current_result(&self) -> Option<&LoadTestResult> {
        self.current_result.as_ref()
    }

    pub fn current_result_metadata(&self) -> Option<&ResultMetadata> {
        self.current_result_metadata.as_ref()
    }

    pub fn run_in_flight(&self) -> Option<i64> {
        self.run_in_flight
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn signup_form(&self) -> &SignupForm {
        &self.signup_form
    }

    pub fn signin_form(&self) -> &SigninForm {
        &self.signin_form
    }

    pub fn signup_error(&self) -> Option<&str> {
        self.signup_error.as_deref()
    }

    pub fn signin_error(&self) -> Option<&str> {
        self.signin_error.as_deref()
    }

    // -----------------------------------------------------------------------
    // Durable operations
    // -----------------------------------------------------------------------

    /// Append a new session with default fields and persist.
    pub async fn create_session(&mut self) -> Result<Session, KaskadeError> {
        let id = self.next_id();
        let created_by = self
            .user
            .as_ref()
            .map_or_else(|| "anonymous".to_string(), |u| u.username.clone());
        let session = Session::new(id, created_by);
        self.sessions.push(session.clone());
        self.persist().await?;
        Ok(session)
    }

    /// Deep-copy an existing session under a fresh id and timestamps, with
    /// a "Copy of " name prefix. Request ids are kept; they only need to be
    /// unique within their owning session.
    pub async fn duplicate_session(&mut self, session_id: i64) -> Result<Session, KaskadeError> {
        let source = self
            .session(session_id)
            .ok_or_else(|| KaskadeError::SessionNotFound(session_id.to_string()))?;

        let mut copy = source.clone();
        let id = self.next_id();
        copy.session_id = id;
        copy.session_name = format!("Copy of {}", copy.session_name);
        copy.created_on = id;
        copy.last_modified = id;

        self.sessions.push(copy.clone());
        self.persist().await?;
        Ok(copy)
    }

    pub async fn delete_session(&mut self, session_id: i64) -> Result<(), KaskadeError> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.session_id != session_id);
        if self.sessions.len() == before {
            return Err(KaskadeError::SessionNotFound(session_id.to_string()));
        }
        if self.active_session_id == Some(session_id) {
            self.active_session_id = None;
            self.clear_session_scoped_state();
        }
        self.persist().await
    }

    pub async fn rename_session(
        &mut self,
        session_id: i64,
        name: impl Into<String>,
    ) -> Result<(), KaskadeError> {
        let now = now_ms();
        let session = self.session_mut(session_id)?;
        session.session_name = name.into();
        session.touch(now);
        self.persist().await
    }

    pub async fn update_session_overview(
        &mut self,
        session_id: i64,
        overview: impl Into<String>,
    ) -> Result<(), KaskadeError> {
        let now = now_ms();
        let session = self.session_mut(session_id)?;
        session.overview = overview.into();
        session.touch(now);
        self.persist().await
    }

    /// Append a default request to the session and persist.
    pub async fn add_request(&mut self, session_id: i64) -> Result<Request, KaskadeError> {
        let id = self.next_id();
        let now = now_ms();
        let session = self.session_mut(session_id)?;
        let request = Request::new(id);
        session.requests.push(request.clone());
        session.touch(now);
        self.persist().await?;
        Ok(request)
    }

    pub async fn delete_request(
        &mut self,
        session_id: i64,
        request_id: i64,
    ) -> Result<(), KaskadeError> {
        let now = now_ms();
        let session = self.session_mut(session_id)?;
        let before = session.requests.len();
        session.requests.retain(|r| r.request_id != request_id);
        if session.requests.len() == before {
            return Err(KaskadeError::RequestNotFound {
                session_id,
                request_id,
            });
        }
        session.touch(now);
        self.persist().await
    }

    /// Apply a partial update to a request and persist.
    ///
    /// URL and params stay synchronized: an edited URL re-derives the
    /// params from its query string (winning over a params edit in the same
    /// update), while an edited params list rebuilds the URL's query.
    pub async fn update_request(
        &mut self,
        session_id: i64,
        request_id: i64,
        update: RequestUpdate,
    ) -> Result<Request, KaskadeError> {
        let now = now_ms();
        let session = self.session_mut(session_id)?;
        let request = session
            .requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or(KaskadeError::RequestNotFound {
                session_id,
                request_id,
            })?;

        if let Some(name) = update.request_name {
            request.request_name = name;
        }
        if let Some(method) = update.method {
            request.method = method;
        }
        if let Some(body) = update.req_body {
            request.req_body = body;
        }
        if let Some(headers) = update.headers {
            request.headers = headers;
        }
        if let Some(content_type) = update.content_type {
            request.content_type = content_type;
        }
        match (update.url, update.params) {
            (Some(url), _) => {
                request.params = sync::params_from_url(&url);
                request.url = url;
            }
            (None, Some(params)) => {
                request.url = sync::url_with_params(&request.url, &params);
                request.params = params;
            }
            (None, None) => {}
        }

        let updated = request.clone();
        session.touch(now);
        self.persist().await?;
        Ok(updated)
    }

    /// Append a completed run's record to the session history and persist.
    pub async fn record_history(
        &mut self,
        session_id: i64,
        entry: HistoryEntry,
    ) -> Result<(), KaskadeError> {
        let session = self.session_mut(session_id)?;
        let timestamp = entry.timestamp;
        session.history.push(entry);
        session.touch(timestamp);
        self.persist().await
    }

    // -----------------------------------------------------------------------
    // Transient operations
    // -----------------------------------------------------------------------

    pub fn set_run_config(&mut self, draft: RunConfigDraft) {
        self.run_config = draft;
    }

    /// Record a validation outcome, flipping the re-trigger flag.
    pub fn set_validation(&mut self, valid: bool, error: Option<String>) {
        self.validation = ValidationState {
            valid,
            flag: !self.validation.flag,
            error,
        };
    }

    /// Switch the active session, clearing all session-scoped transient
    /// state when the selection actually changes. Switching to a session
    /// that does not exist is an error.
    pub fn set_active_session(&mut self, session_id: Option<i64>) -> Result<(), KaskadeError> {
        if let Some(id) = session_id {
            if self.session(id).is_none() {
                return Err(KaskadeError::SessionNotFound(id.to_string()));
            }
        }
        if self.active_session_id != session_id {
            self.active_session_id = session_id;
            self.clear_session_scoped_state();
        }
        Ok(())
    }

    /// Reset result, metadata, run-config draft, and validation. A stale
    /// valid-run signal must never re-fire against a newly selected
    /// session, so `valid` drops to false and the flag still flips.
    pub fn clear_session_scoped_state(&mut self) {
        self.current_result = None;
        self.current_result_metadata = None;
        self.run_config = RunConfigDraft::default();
        self.validation = ValidationState {
            valid: false,
            flag: !self.validation.flag,
            error: None,
        };
    }

    pub fn set_result(
        &mut self,
        result: Option<LoadTestResult>,
        metadata: Option<ResultMetadata>,
    ) {
        self.current_result = result;
        self.current_result_metadata = metadata;
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub fn set_signup_form(&mut self, form: SignupForm) {
        self.signup_form = form;
    }

    pub fn set_signin_form(&mut self, form: SigninForm) {
        self.signin_form = form;
    }

    pub fn set_signup_error(&mut self, error: Option<String>) {
        self.signup_error = error;
    }

    pub fn set_signin_error(&mut self, error: Option<String>) {
        self.signin_error = error;
    }

    // -----------------------------------------------------------------------
    // Run bookkeeping
    // -----------------------------------------------------------------------

    /// Mark a run as in flight for the given session. Returns false when a
    /// run is already outstanding, in which case the caller must not
    /// dispatch.
    pub(crate) fn begin_run(&mut self, session_id: i64) -> bool {
        if self.run_in_flight.is_some() {
            return false;
        }
        self.run_in_flight = Some(session_id);
        true
    }

    pub(crate) fn finish_run(&mut self) {
        self.run_in_flight = None;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn session_mut(&mut self, session_id: i64) -> Result<&mut Session, KaskadeError> {
        self.sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| KaskadeError::SessionNotFound(session_id.to_string()))
    }

    /// Issue a fresh id. Ids are creation timestamps in epoch milliseconds,
    /// bumped past the last issued id so rapid creation within the same
    /// millisecond can never produce a duplicate.
    fn next_id(&mut self) -> i64 {
        let id = now_ms().max(self.last_issued_id + 1);
        self.last_issued_id = id;
        id
    }

    async fn persist(&self) -> Result<(), KaskadeError> {
        self.datafile.save(&self.sessions).await.inspect_err(|e| {
            tracing::warn!(
                path = %self.datafile.path().display(),
                error = %e,
                "failed to persist session document"
            );
        })
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
