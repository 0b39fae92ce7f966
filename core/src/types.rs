//! Domain DTOs for the Habitica API.
//!
//! # Design
//! These types are defined independently from the mock-server's schema.
//! Integration tests run them against the mock server, which catches casing
//! drift (the external API speaks camelCase; Rust fields are snake_case and
//! `serde` maps between the two).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Suffix appended to the user id to form the `x-client` header.
pub const CLIENT_SUFFIX: &str = "PAPA";

/// Authentication state obtained from a login exchange.
///
/// `user_id` and `api_token` are always set together; `client_id` is derived
/// from `user_id` at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub api_token: String,
    pub client_id: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, api_token: impl Into<String>, client_suffix: &str) -> Self {
        let user_id = user_id.into();
        let client_id = format!("{user_id}-{client_suffix}");
        Self {
            user_id,
            api_token: api_token.into(),
            client_id,
        }
    }

    /// Derive the header set sent on every authenticated call.
    pub fn header_set(&self) -> HeaderSet {
        HeaderSet {
            client: self.client_id.clone(),
            api_user: self.user_id.clone(),
            api_key: self.api_token.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("api_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// The three headers required on authenticated calls.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderSet {
    pub client: String,
    pub api_user: String,
    pub api_key: String,
}

impl HeaderSet {
    pub const CLIENT: &'static str = "x-client";
    pub const API_USER: &'static str = "x-api-user";
    pub const API_KEY: &'static str = "x-api-key";

    pub fn pairs(&self) -> Vec<(String, String)> {
        vec![
            (Self::CLIENT.to_string(), self.client.clone()),
            (Self::API_USER.to_string(), self.api_user.clone()),
            (Self::API_KEY.to_string(), self.api_key.clone()),
        ]
    }
}

impl fmt::Debug for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderSet")
            .field("client", &self.client)
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Body of the login call.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Envelope of a successful login response: `{"data": {"id", "apiToken"}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub data: LoginData,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub id: String,
    pub api_token: String,
}

impl fmt::Debug for LoginData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginData")
            .field("id", &self.id)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Habit,
    Daily,
    #[default]
    Todo,
    Reward,
}

/// Character attribute a task trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Str,
    Int,
    Per,
    Con,
}

/// How often a daily recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Weekdays on which a weekly daily is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Repeat {
    pub su: bool,
    pub m: bool,
    pub t: bool,
    pub w: bool,
    pub th: bool,
    pub f: bool,
    pub s: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    pub time: String,
}

/// A task to create in the external service.
///
/// Fields that only apply to some task types (`frequency`, `up`, `value`,
/// ...) are always sent; the service ignores the ones that do not match
/// `task_type`. Unset optional fields are omitted from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub text: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub tags: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Attribute>,
    pub checklist: Vec<ChecklistItem>,
    pub collapse_checklist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Due date, ISO-8601.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub priority: f64,
    pub reminders: Vec<Reminder>,
    pub frequency: Frequency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    pub every_x: u32,
    pub streak: u32,
    pub days_of_month: Vec<u8>,
    pub weeks_of_month: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    pub up: bool,
    pub down: bool,
    /// Gold cost; only meaningful for rewards.
    pub value: f64,
}

impl TaskItem {
    pub fn new(text: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            text: text.into(),
            task_type,
            tags: Vec::new(),
            alias: None,
            attribute: None,
            checklist: Vec::new(),
            collapse_checklist: false,
            notes: None,
            date: None,
            priority: 1.0,
            reminders: Vec::new(),
            frequency: Frequency::Daily,
            repeat: None,
            every_x: 1,
            streak: 0,
            days_of_month: Vec::new(),
            weeks_of_month: Vec::new(),
            start_date: None,
            up: true,
            down: false,
            value: 0.0,
        }
    }

    pub fn todo(text: impl Into<String>) -> Self {
        Self::new(text, TaskType::Todo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_derive_client_id_and_headers() {
        let creds = Credentials::new("U", "T", CLIENT_SUFFIX);
        assert_eq!(creds.client_id, "U-PAPA");
        assert_eq!(
            creds.header_set().pairs(),
            vec![
                ("x-client".to_string(), "U-PAPA".to_string()),
                ("x-api-user".to_string(), "U".to_string()),
                ("x-api-key".to_string(), "T".to_string()),
            ]
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let creds = Credentials::new("user", "very-secret-token", CLIENT_SUFFIX);
        assert!(!format!("{creds:?}").contains("very-secret-token"));
        assert!(!format!("{:?}", creds.header_set()).contains("very-secret-token"));

        let login = LoginRequest {
            username: "papa".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{login:?}").contains("hunter2"));
    }

    #[test]
    fn login_response_reads_camel_case_token() {
        let parsed: LoginResponse =
            serde_json::from_str(r#"{"success":true,"data":{"id":"U","apiToken":"T","username":"papa"}}"#)
                .unwrap();
        assert_eq!(parsed.data.id, "U");
        assert_eq!(parsed.data.api_token, "T");
    }

    #[test]
    fn task_item_serializes_in_camel_case() {
        let mut item = TaskItem::new("Water plants", TaskType::Daily);
        item.every_x = 2;
        item.collapse_checklist = true;
        item.days_of_month = vec![1, 15];
        item.start_date = Some("2026-01-01".to_string());
        item.attribute = Some(Attribute::Con);

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["text"], "Water plants");
        assert_eq!(json["type"], "daily");
        assert_eq!(json["everyX"], 2);
        assert_eq!(json["collapseChecklist"], true);
        assert_eq!(json["daysOfMonth"], serde_json::json!([1, 15]));
        assert_eq!(json["weeksOfMonth"], serde_json::json!([]));
        assert_eq!(json["startDate"], "2026-01-01");
        assert_eq!(json["attribute"], "con");
        assert_eq!(json["frequency"], "daily");
        assert!(json.get("every_x").is_none());
        assert!(json.get("task_type").is_none());
    }

    #[test]
    fn unset_optional_fields_are_omitted() {
        let json = serde_json::to_value(TaskItem::todo("Buy milk")).unwrap();
        assert!(json.get("alias").is_none());
        assert!(json.get("notes").is_none());
        assert!(json.get("repeat").is_none());
        assert_eq!(json["type"], "todo");
        assert_eq!(json["priority"], 1.0);
        assert_eq!(json["up"], true);
        assert_eq!(json["down"], false);
    }
}
