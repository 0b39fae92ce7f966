//! Stateless HTTP request builder and response parser for the Habitica API.
//!
//! # Design
//! `HabiticaClient` holds only a `base_url` and carries no mutable state
//! between calls. Each call is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`. The
//! `SessionManager` executes the round-trip in between, so everything here is
//! deterministic.

use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{HeaderSet, LoginData, LoginRequest, LoginResponse};

/// Path of the username/password exchange.
pub const LOGIN_ENDPOINT: &str = "/user/auth/local/login";

/// Path of the task collection of the authenticated user.
pub const TASKS_ENDPOINT: &str = "/tasks/user";

/// Synchronous, stateless client for the Habitica API.
#[derive(Debug, Clone)]
pub struct HabiticaClient {
    base_url: String,
}

impl HabiticaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url(LOGIN_ENDPOINT),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            query: Vec::new(),
            body: Some(body),
        })
    }

    /// Build an authenticated call to `endpoint`.
    ///
    /// For `GET` the payload must be a JSON object; its entries become query
    /// parameters. For `POST` the payload is sent as the JSON body (an empty
    /// object when absent).
    pub fn build_request(
        &self,
        endpoint: &str,
        method: HttpMethod,
        payload: Option<&Value>,
        headers: &HeaderSet,
    ) -> Result<HttpRequest, ApiError> {
        let mut request = HttpRequest {
            method,
            url: self.url(endpoint),
            headers: headers.pairs(),
            query: Vec::new(),
            body: None,
        };
        match method {
            HttpMethod::Get => {
                if let Some(payload) = payload {
                    request.query = query_pairs(payload)?;
                }
            }
            HttpMethod::Post => {
                let body = match payload {
                    Some(payload) => serde_json::to_string(payload),
                    None => serde_json::to_string(&serde_json::json!({})),
                }
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
                request
                    .headers
                    .push(("content-type".to_string(), "application/json".to_string()));
                request.body = Some(body);
            }
        }
        Ok(request)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginData, ApiError> {
        check_status(&response, 200)?;
        let parsed: LoginResponse =
            serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        Ok(parsed.data)
    }

    /// Classify a response to `build_request` and decode its body.
    pub fn parse_response(&self, method: HttpMethod, response: HttpResponse) -> Result<Value, ApiError> {
        check_status(&response, method.success_status())?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    match response.status {
        status if status == expected => Ok(()),
        400 => Err(ApiError::BadRequest),
        401 => Err(ApiError::Unauthorized),
        status => Err(ApiError::Status { status }),
    }
}

fn query_pairs(payload: &Value) -> Result<Vec<(String, String)>, ApiError> {
    let Value::Object(map) = payload else {
        return Err(ApiError::Serialization(
            "query parameters must be a JSON object".to_string(),
        ));
    };
    Ok(map
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect())
}
