use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{router, MockState, Shared, Task};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn state() -> Shared {
    MockState::new("papa", "secret")
}

/// Attach the auth header trio for `state`'s account.
async fn authed(state: &Shared, builder: http::request::Builder) -> http::request::Builder {
    builder
        .header("x-client", format!("{}-PAPA", state.user_id))
        .header("x-api-user", state.user_id.as_str())
        .header("x-api-key", state.api_token().await)
}

async fn create(state: &Shared, body: &str) -> axum::response::Response {
    let request = authed(state, Request::builder().method("POST").uri("/tasks/user"))
        .await
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap();
    router(state.clone()).oneshot(request).await.unwrap()
}

async fn list(state: &Shared, query: &str) -> axum::response::Response {
    let request = authed(state, Request::builder().uri(format!("/tasks/user{query}")))
        .await
        .body(String::new())
        .unwrap();
    router(state.clone()).oneshot(request).await.unwrap()
}

// --- login ---

#[tokio::test]
async fn login_returns_id_and_token() {
    let state = state();
    let resp = router(state.clone())
        .oneshot(json_request(
            "POST",
            "/user/auth/local/login",
            r#"{"username":"papa","password":"secret"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["data"]["id"], state.user_id.as_str());
    assert_eq!(body["data"]["apiToken"], state.api_token().await.as_str());
    assert_eq!(state.login_count(), 1);
}

#[tokio::test]
async fn login_with_wrong_password_returns_401() {
    let state = state();
    let resp = router(state.clone())
        .oneshot(json_request(
            "POST",
            "/user/auth/local/login",
            r#"{"username":"papa","password":"nope"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(state.login_count(), 0);
    assert_eq!(state.login_attempts(), 1);
}

#[tokio::test]
async fn injected_login_failures_return_503_then_recover() {
    let state = state();
    state.fail_next_logins(1);
    let login = || {
        json_request(
            "POST",
            "/user/auth/local/login",
            r#"{"username":"papa","password":"secret"}"#,
        )
    };

    let resp = router(state.clone()).oneshot(login()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = router(state.clone()).oneshot(login()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(state.login_attempts(), 2);
    assert_eq!(state.login_count(), 1);
}

// --- auth ---

#[tokio::test]
async fn tasks_without_credentials_return_401() {
    let state = state();
    let resp = router(state)
        .oneshot(Request::builder().uri("/tasks/user").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tasks_without_client_header_return_400() {
    let state = state();
    let request = Request::builder()
        .uri("/tasks/user")
        .header("x-api-user", state.user_id.as_str())
        .header("x-api-key", state.api_token().await)
        .body(String::new())
        .unwrap();
    let resp = router(state).oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoked_token_is_rejected() {
    let state = state();
    let request = authed(&state, Request::builder().uri("/tasks/user"))
        .await
        .body(String::new())
        .unwrap();
    state.revoke_token().await;

    let resp = router(state).oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- create ---

#[tokio::test]
async fn create_task_returns_201() {
    let state = state();
    let resp = create(&state, r#"{"text":"Buy milk","type":"todo","everyX":2}"#).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = body_json(resp).await;
    let task: Task = serde_json::from_value(body["data"].clone()).unwrap();
    assert_eq!(task.text, "Buy milk");
    assert_eq!(task.every_x, 2);
    assert!(!task.completed);
    assert_eq!(state.tasks().await.len(), 1);
}

#[tokio::test]
async fn create_task_with_blank_text_returns_400() {
    let state = state();
    let resp = create(&state, r#"{"text":"   "}"#).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(state.tasks().await.is_empty());
}

#[tokio::test]
async fn create_task_malformed_json_returns_422() {
    let state = state();
    let resp = create(&state, r#"{"not_text":1}"#).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_task_unparsable_body_returns_400() {
    let state = state();
    let resp = create(&state, "not json").await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!body_bytes(resp).await.is_empty());
}

// --- list ---

#[tokio::test]
async fn list_filters_by_type() {
    let state = state();
    create(&state, r#"{"text":"Todo one","type":"todo"}"#).await;
    create(&state, r#"{"text":"Daily one","type":"daily"}"#).await;

    let resp = list(&state, "?type=todos").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    let tasks: Vec<Task> = serde_json::from_value(body["data"].clone()).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "Todo one");

    let body: Value = body_json(list(&state, "?type=dailys").await).await;
    assert_eq!(body["data"][0]["text"], "Daily one");

    let body: Value = body_json(list(&state, "").await).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn list_with_unknown_type_returns_400() {
    let state = state();
    let resp = list(&state, "?type=chores").await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
