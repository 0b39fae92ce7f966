//! HTTP transport types shared by the request builder and the session manager.
//!
//! # Design
//! `HabiticaClient` describes every call to the external service as a plain
//! `HttpRequest` and classifies a plain `HttpResponse`. Only the
//! `SessionManager` touches the network: it turns an `HttpRequest` into a
//! `reqwest` call on the live session handle and hands the status and body
//! back as an `HttpResponse`. Keeping the two halves as data lets the status
//! classification be tested without a server.

use std::fmt;

/// HTTP method accepted by the request pipeline.
///
/// The external service is only ever read (`GET`) or appended to (`POST`)
/// by this crate, so no other verbs exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    /// Status code the external service answers with when the call succeeds.
    pub fn success_status(self) -> u16 {
        match self {
            HttpMethod::Get => 200,
            HttpMethod::Post => 201,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute (base URL + endpoint). `query` is only populated for
/// `GET` calls and `body` only for `POST` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}
