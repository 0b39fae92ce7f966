//! Stateful session manager for the Habitica API.
//!
//! # Design
//! `SessionManager` owns everything that changes over the life of the bot:
//! the session handle (a pooled `reqwest::Client` whose default headers are
//! fixed at construction), the credentials obtained from the login exchange,
//! and the header set derived from them. Request shapes and status
//! classification are delegated to the stateless `HabiticaClient`.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Logins are serialised by a separate async gate so concurrent
//! first use produces a single login call. All outbound calls pass through a
//! `Throttle` first.
//!
//! Lifecycle: no header set (`ensure_session` reports `MissingHeaders`) →
//! headerless handle opened for the login call → header-bound handle once
//! credentials arrive. A new login always replaces the handle, because a
//! handle's headers cannot change after it is built.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::{HabiticaClient, TASKS_ENDPOINT};
use crate::config::Config;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::throttle::Throttle;
use crate::types::{Credentials, HeaderSet, LoginData, LoginRequest, TaskItem};

/// Task filter used by `get_todos` when the caller has no preference.
pub const DEFAULT_TASK_FILTER: &str = "todos";

/// Successful outcome of [`SessionManager::ensure_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    AlreadyActive,
}

impl SessionStatus {
    pub fn code(self) -> u16 {
        match self {
            SessionStatus::Created => 200,
            SessionStatus::AlreadyActive => 100,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            SessionStatus::Created => "Session created",
            SessionStatus::AlreadyActive => "Session already active",
        }
    }
}

#[derive(Debug, Clone)]
struct SessionHandle {
    id: u64,
    http: reqwest::Client,
}

#[derive(Debug)]
struct SessionState {
    username: String,
    handle: Option<SessionHandle>,
    credentials: Option<Credentials>,
    headers: Option<HeaderSet>,
}

/// Mediates every call to the Habitica API.
///
/// Construct one at startup and share it (`Arc<SessionManager>`) with every
/// caller. No method panics or propagates a transport error by unwinding;
/// every failure is an [`ApiError`] value.
pub struct SessionManager {
    client: HabiticaClient,
    config: Config,
    state: Mutex<SessionState>,
    login_gate: tokio::sync::Mutex<()>,
    login_epoch: AtomicU64,
    next_session_id: AtomicU64,
    throttle: Throttle,
}

impl SessionManager {
    pub fn new(config: Config) -> Self {
        Self {
            client: HabiticaClient::new(&config.base_url),
            state: Mutex::new(SessionState {
                username: config.username.clone(),
                handle: None,
                credentials: None,
                headers: None,
            }),
            login_gate: tokio::sync::Mutex::new(()),
            login_epoch: AtomicU64::new(0),
            next_session_id: AtomicU64::new(0),
            throttle: Throttle::new(config.api_delay),
            config,
        }
    }

    pub fn username(&self) -> String {
        self.lock_state().username.clone()
    }

    /// Change the account used by the next login. Current credentials stay
    /// in place until then.
    pub fn set_username(&self, username: impl Into<String>) {
        self.lock_state().username = username.into();
    }

    pub fn client_id(&self) -> Option<String> {
        self.lock_state().credentials.as_ref().map(|c| c.client_id.clone())
    }

    /// Override the `x-client` value of the current credentials.
    ///
    /// The header set is rebuilt and the live handle dropped, so the next
    /// call opens a handle bound to the new value. An empty id makes
    /// `ensure_session` report `MissingClientId`.
    pub fn set_client_id(&self, client_id: impl Into<String>) -> Result<(), ApiError> {
        let mut state = self.lock_state();
        let Some(credentials) = state.credentials.as_mut() else {
            return Err(ApiError::MissingHeaders);
        };
        credentials.client_id = client_id.into();
        let headers = credentials.header_set();
        state.headers = Some(headers);
        if let Some(handle) = state.handle.take() {
            debug!(session_id = handle.id, "session closed for new client id");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.lock_state().credentials.clone()
    }

    pub fn header_set(&self) -> Option<HeaderSet> {
        self.lock_state().headers.clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.lock_state().credentials.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().handle.is_some()
    }

    /// Identifier of the live session handle. Changes every time a new
    /// handle is opened.
    pub fn session_id(&self) -> Option<u64> {
        self.lock_state().handle.as_ref().map(|h| h.id)
    }

    /// Make sure a session handle bound to the current header set exists.
    ///
    /// Performs no network I/O. Fails with `MissingHeaders` /
    /// `MissingClientId` (both status 404) until credentials are available.
    pub fn ensure_session(&self) -> Result<SessionStatus, ApiError> {
        let mut state = self.lock_state();
        if state.handle.is_some() {
            return Ok(SessionStatus::AlreadyActive);
        }
        let Some(headers) = state.headers.clone() else {
            return Err(ApiError::MissingHeaders);
        };
        if headers.client.is_empty() {
            return Err(ApiError::MissingClientId);
        }
        let handle = self.open_handle(Some(&headers))?;
        debug!(session_id = handle.id, "session created");
        state.handle = Some(handle);
        Ok(SessionStatus::Created)
    }

    /// Release the session handle. A no-op when none is open.
    ///
    /// Credentials and headers are kept, so the next `ensure_session`
    /// reopens a handle with the same headers.
    pub fn close_session(&self) {
        let handle = self.lock_state().handle.take();
        if let Some(handle) = handle {
            debug!(session_id = handle.id, "session closed");
        }
    }

    /// Close the session and forget the credentials.
    pub fn sign_out(&self) {
        let mut state = self.lock_state();
        state.handle = None;
        state.credentials = None;
        state.headers = None;
        info!(username = %state.username, "signed out");
    }

    /// Install a user id / API token pair without a login exchange.
    pub fn use_api_token(&self, user_id: impl Into<String>, api_token: impl Into<String>) -> Result<(), ApiError> {
        let credentials = Credentials::new(user_id, api_token, &self.config.client_suffix);
        self.install_credentials(credentials)?;
        self.login_epoch.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Exchange the configured username and password for credentials.
    ///
    /// Transient failures (transport errors, timeouts, `429`, `5xx`) are
    /// retried with exponential backoff up to `login_max_attempts`; any other
    /// failure ends the fetch at once. Either way an exhausted fetch returns
    /// `ApiError::Auth` and leaves the credential state untouched.
    ///
    /// Concurrent callers share one login: whoever waited behind an
    /// in-flight login returns as soon as it has installed credentials.
    pub async fn fetch_credentials(&self) -> Result<(), ApiError> {
        let observed = self.login_epoch.load(Ordering::Acquire);
        let _gate = self.login_gate.lock().await;
        if self.login_epoch.load(Ordering::Acquire) != observed && self.has_credentials() {
            debug!("credentials installed by a concurrent login");
            return Ok(());
        }
        self.login().await
    }

    /// Log in only if no credentials are present once the login gate is
    /// held.
    async fn ensure_credentials(&self) -> Result<(), ApiError> {
        let _gate = self.login_gate.lock().await;
        if self.has_credentials() {
            return Ok(());
        }
        self.login().await
    }

    /// Login exchange with retries. Callers hold `login_gate`.
    async fn login(&self) -> Result<(), ApiError> {
        let handle = self.login_handle()?;
        let login = LoginRequest {
            username: self.username(),
            password: self.config.password.clone(),
        };
        let max_attempts = self.config.login_max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.login_once(&handle, &login).await {
                Ok(data) => {
                    let credentials = Credentials::new(data.id, data.api_token, &self.config.client_suffix);
                    self.install_credentials(credentials)?;
                    self.login_epoch.fetch_add(1, Ordering::AcqRel);
                    info!(username = %login.username, attempt, "logged in to Habitica");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.login_backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "login failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "login failed");
                    return Err(ApiError::Auth {
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// Issue an authenticated call and decode the response body.
    ///
    /// `payload` becomes the query string for `GET` and the JSON body for
    /// `POST`. A `GET` succeeds on `200`, a `POST` on `201`.
    pub async fn request(&self, endpoint: &str, method: HttpMethod, payload: Option<&Value>) -> Result<Value, ApiError> {
        self.ensure_session()?;
        if !self.has_credentials() {
            self.ensure_credentials().await?;
        }

        let (handle, headers) = self.active_session()?;
        let request = self.client.build_request(endpoint, method, payload, &headers)?;
        self.throttle.wait().await;
        debug!(%method, url = %request.url, session_id = handle.id, "calling Habitica");

        let response = match execute(&handle.http, request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, endpoint, error = %err, "Habitica request failed");
                return Err(err);
            }
        };
        let status = response.status;
        let result = self.client.parse_response(method, response);
        match &result {
            Ok(_) => debug!(%method, endpoint, status, "Habitica response"),
            Err(err) => warn!(%method, endpoint, status, error = %err, "Habitica returned an error"),
        }
        result
    }

    /// Fetch the user's tasks of `task_type` (`todos`, `dailys`, `habits`,
    /// `rewards`, `completedTodos`).
    pub async fn get_todos(&self, task_type: &str) -> Result<Value, ApiError> {
        let query = json!({ "type": task_type });
        self.request(TASKS_ENDPOINT, HttpMethod::Get, Some(&query)).await
    }

    pub async fn create_todo(&self, task: &TaskItem) -> Result<Value, ApiError> {
        let payload = serde_json::to_value(task).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.request(TASKS_ENDPOINT, HttpMethod::Post, Some(&payload)).await
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_handle(&self, headers: Option<&HeaderSet>) -> Result<SessionHandle, ApiError> {
        let mut default_headers = HeaderMap::new();
        if let Some(headers) = headers {
            default_headers.insert(HeaderName::from_static(HeaderSet::CLIENT), header_value(HeaderSet::CLIENT, &headers.client)?);
            default_headers.insert(
                HeaderName::from_static(HeaderSet::API_USER),
                header_value(HeaderSet::API_USER, &headers.api_user)?,
            );
            let mut key = header_value(HeaderSet::API_KEY, &headers.api_key)?;
            key.set_sensitive(true);
            default_headers.insert(HeaderName::from_static(HeaderSet::API_KEY), key);
        }
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(self.config.request_timeout)
            .build()?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(SessionHandle { id, http })
    }

    /// Handle used for the login call: the live one if any, otherwise a new
    /// headerless handle kept in the session slot.
    fn login_handle(&self) -> Result<SessionHandle, ApiError> {
        let mut state = self.lock_state();
        if let Some(handle) = &state.handle {
            return Ok(handle.clone());
        }
        let handle = self.open_handle(None)?;
        debug!(session_id = handle.id, "opened headerless session for login");
        state.handle = Some(handle.clone());
        Ok(handle)
    }

    async fn login_once(&self, handle: &SessionHandle, login: &LoginRequest) -> Result<LoginData, ApiError> {
        let request = self.client.build_login(login)?;
        self.throttle.wait().await;
        debug!(url = %request.url, session_id = handle.id, "requesting Habitica credentials");
        let response = execute(&handle.http, request).await?;
        self.client.parse_login(response)
    }

    /// Swap in new credentials, their header set, and a handle bound to it
    /// in one step.
    fn install_credentials(&self, credentials: Credentials) -> Result<(), ApiError> {
        let headers = credentials.header_set();
        let handle = self.open_handle(Some(&headers))?;
        let mut state = self.lock_state();
        debug!(
            session_id = handle.id,
            replaced = ?state.handle.as_ref().map(|h| h.id),
            client = %headers.client,
            "session bound to new credentials"
        );
        state.handle = Some(handle);
        state.credentials = Some(credentials);
        state.headers = Some(headers);
        Ok(())
    }

    fn active_session(&self) -> Result<(SessionHandle, HeaderSet), ApiError> {
        let mut state = self.lock_state();
        let headers = state.headers.clone().ok_or(ApiError::MissingHeaders)?;
        let handle = match &state.handle {
            Some(handle) => handle.clone(),
            // Closed between `ensure_session` and here.
            None => {
                let handle = self.open_handle(Some(&headers))?;
                state.handle = Some(handle.clone());
                handle
            }
        };
        Ok((handle, headers))
    }

    fn login_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.config.login_backoff.saturating_mul(factor)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::RequestFailed(format!("invalid value for header {name}")))
}

/// Execute `request` on `http` and collect status and body.
async fn execute(http: &reqwest::Client, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    let mut builder = http.request(request.method.into(), &request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !request.query.is_empty() {
        builder = builder.query(&request.query);
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }
    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(HttpResponse { status, body })
}
