use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_USERNAME: &str = "papa";
pub const DEFAULT_PASSWORD: &str = "secret";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub notes: String,
    pub tags: Vec<Uuid>,
    pub priority: f64,
    pub every_x: u32,
    pub frequency: String,
    pub collapse_checklist: bool,
    pub completed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub text: String,
    #[serde(rename = "type", default = "default_task_type")]
    pub task_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default = "default_every_x")]
    pub every_x: u32,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default)]
    pub collapse_checklist: bool,
}

fn default_task_type() -> String {
    "todo".to_string()
}

fn default_priority() -> f64 {
    1.0
}

fn default_every_x() -> u32 {
    1
}

fn default_frequency() -> String {
    "weekly".to_string()
}

#[derive(Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct TaskQuery {
    #[serde(rename = "type")]
    pub task_type: Option<String>,
}

/// In-memory stand-in for one Habitica account.
///
/// Tests keep a handle to it to inspect login counters, inject login
/// failures, and rotate the API token.
#[derive(Debug)]
pub struct MockState {
    pub user_id: String,
    pub username: String,
    password: String,
    api_token: RwLock<String>,
    tasks: RwLock<Vec<Task>>,
    logins: AtomicU32,
    login_attempts: AtomicU32,
    failing_logins: AtomicU32,
}

pub type Shared = Arc<MockState>;

impl MockState {
    pub fn new(username: &str, password: &str) -> Shared {
        Arc::new(Self {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password: password.to_string(),
            api_token: RwLock::new(Uuid::new_v4().to_string()),
            tasks: RwLock::new(Vec::new()),
            logins: AtomicU32::new(0),
            login_attempts: AtomicU32::new(0),
            failing_logins: AtomicU32::new(0),
        })
    }

    pub async fn api_token(&self) -> String {
        self.api_token.read().await.clone()
    }

    /// Replace the API token; requests carrying the old one get 401.
    pub async fn revoke_token(&self) {
        *self.api_token.write().await = Uuid::new_v4().to_string();
    }

    /// Number of successful logins.
    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    /// Number of login calls received, successful or not.
    pub fn login_attempts(&self) -> u32 {
        self.login_attempts.load(Ordering::SeqCst)
    }

    /// Answer the next `count` login calls with 503.
    pub fn fail_next_logins(&self, count: u32) {
        self.failing_logins.store(count, Ordering::SeqCst);
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }
}

type Failure = (StatusCode, Json<Value>);

fn failure(status: StatusCode, error: &str, message: &str) -> Failure {
    (
        status,
        Json(json!({ "success": false, "error": error, "message": message })),
    )
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/user/auth/local/login", post(login))
        .route("/tasks/user", get(list_tasks).post(create_task))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Shared) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

async fn login(State(state): State<Shared>, Json(input): Json<Login>) -> Result<Json<Value>, Failure> {
    state.login_attempts.fetch_add(1, Ordering::SeqCst);

    let injected = state
        .failing_logins
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if injected {
        tracing::warn!("injected login failure");
        return Err(failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "ServiceUnavailable",
            "Habitica is temporarily unavailable.",
        ));
    }

    if input.username != state.username || input.password != state.password {
        return Err(failure(
            StatusCode::UNAUTHORIZED,
            "NotAuthorized",
            "Uh-oh - your username or password is incorrect.",
        ));
    }

    state.logins.fetch_add(1, Ordering::SeqCst);
    tracing::info!(username = %state.username, "login");
    let token = state.api_token().await;
    Ok(Json(json!({
        "success": true,
        "data": {
            "id": state.user_id,
            "apiToken": token,
            "newUser": false,
            "username": state.username,
        }
    })))
}

async fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Failure> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let token = state.api_token.read().await;
    if header("x-api-user") != Some(state.user_id.as_str()) || header("x-api-key") != Some(token.as_str()) {
        return Err(failure(
            StatusCode::UNAUTHORIZED,
            "NotAuthorized",
            "There is no account that uses those credentials.",
        ));
    }
    if header("x-client").map_or(true, str::is_empty) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            "Missing x-client header.",
        ));
    }
    Ok(())
}

async fn list_tasks(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Value>, Failure> {
    authorize(&state, &headers).await?;

    let keep: fn(&Task) -> bool = match query.task_type.as_deref() {
        None => |_| true,
        Some("habits") => |t| t.task_type == "habit",
        Some("dailys") => |t| t.task_type == "daily",
        Some("todos") => |t| t.task_type == "todo" && !t.completed,
        Some("completedTodos") => |t| t.task_type == "todo" && t.completed,
        Some("rewards") => |t| t.task_type == "reward",
        Some(_) => {
            return Err(failure(
                StatusCode::BAD_REQUEST,
                "BadRequest",
                "Invalid request parameters.",
            ))
        }
    };

    let tasks: Vec<Task> = state.tasks.read().await.iter().filter(|t| keep(t)).cloned().collect();
    Ok(Json(json!({ "success": true, "data": tasks })))
}

async fn create_task(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(input): Json<CreateTask>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    authorize(&state, &headers).await?;

    if input.text.trim().is_empty() {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            "Task text cannot be empty.",
        ));
    }

    let task = Task {
        id: Uuid::new_v4(),
        text: input.text,
        task_type: input.task_type,
        notes: input.notes.unwrap_or_default(),
        tags: input.tags,
        priority: input.priority,
        every_x: input.every_x,
        frequency: input.frequency,
        collapse_checklist: input.collapse_checklist,
        completed: false,
    };
    state.tasks.write().await.push(task.clone());
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": task }))))
}
