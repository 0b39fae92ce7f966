//! Async session manager for the Habitica API.
//!
//! # Overview
//! A chat bot relays user commands to Habitica through one `SessionManager`.
//! The manager acquires credentials by logging in, keeps a pooled HTTP
//! session bound to the resulting auth headers, spaces calls out to respect
//! Habitica's rate-limit policy, and turns every outcome into
//! `Result<serde_json::Value, ApiError>`.
//!
//! # Design
//! - `HabiticaClient` is stateless: it builds `HttpRequest` values and
//!   classifies `HttpResponse` values without touching the network.
//! - `SessionManager` holds all mutable state and performs the I/O with
//!   `reqwest`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod session;
pub mod throttle;
pub mod types;

pub use client::{HabiticaClient, LOGIN_ENDPOINT, TASKS_ENDPOINT};
pub use config::{Config, ConfigError};
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{SessionManager, SessionStatus, DEFAULT_TASK_FILTER};
pub use types::{
    Attribute, ChecklistItem, Credentials, Frequency, HeaderSet, LoginRequest, Reminder, Repeat, TaskItem, TaskType,
    CLIENT_SUFFIX,
};
