//! Error types for the Habitica session manager.
//!
//! # Design
//! Every failure the request pipeline can hit is returned as an `ApiError`
//! value; nothing is raised past the `SessionManager` boundary. The `Display`
//! text of each variant is the message the chat layer forwards to users, so
//! it is kept short and stable. `ErrorKind` groups the variants so callers
//! can decide between "log in first", "re-login", and "retry later" without
//! matching every variant.

/// Errors returned by `SessionManager` and `HabiticaClient`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No header set exists yet; credentials must be fetched first.
    #[error("No header info available")]
    MissingHeaders,

    /// A header set exists but carries no `x-client` value.
    #[error("No x_client info available")]
    MissingClientId,

    #[error("Bad Request: 400")]
    BadRequest,

    /// The service rejected the `x-api-user` / `x-api-key` pair.
    #[error("Unauthorized: 401")]
    Unauthorized,

    /// Any other status, including a success code that does not match the
    /// method (e.g. `200` for a `POST`).
    #[error("API Error: {status}")]
    Status { status: u16 },

    /// Connection-level failure before a status line was received.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out")]
    Timeout,

    /// The login exchange did not produce credentials.
    #[error("Authentication failed after {attempts} attempt(s): {reason}")]
    Auth { attempts: u32, reason: String },

    /// The response body could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Coarse grouping of `ApiError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local session state is incomplete.
    Session,
    /// The service answered with an unexpected status.
    Http,
    /// The service could not be reached or did not answer in time.
    Transport,
    /// Login failed.
    Auth,
    /// JSON encoding or decoding failed.
    Codec,
}

impl ApiError {
    /// Status code associated with the error, if any.
    ///
    /// Session-state errors report `404` to match the status vocabulary
    /// of `ensure_session`.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::MissingHeaders | ApiError::MissingClientId => Some(404),
            ApiError::BadRequest => Some(400),
            ApiError::Unauthorized => Some(401),
            ApiError::Status { status } => Some(*status),
            ApiError::RequestFailed(_)
            | ApiError::Timeout
            | ApiError::Auth { .. }
            | ApiError::Deserialization(_)
            | ApiError::Serialization(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::MissingHeaders | ApiError::MissingClientId => ErrorKind::Session,
            ApiError::BadRequest | ApiError::Unauthorized | ApiError::Status { .. } => ErrorKind::Http,
            ApiError::RequestFailed(_) | ApiError::Timeout => ErrorKind::Transport,
            ApiError::Auth { .. } => ErrorKind::Auth,
            ApiError::Deserialization(_) | ApiError::Serialization(_) => ErrorKind::Codec,
        }
    }

    /// Whether repeating the same call later may succeed.
    ///
    /// True for transport failures, rate limiting (`429`), and server-side
    /// errors (`5xx`).
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RequestFailed(_) | ApiError::Timeout => true,
            ApiError::Status { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::RequestFailed(err.to_string())
        }
    }
}
