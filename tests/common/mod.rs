//! Shared harness for the integration tests: an in-memory database, the
//! real router, and seed helpers that stand in for the out-of-band admin
//! tooling.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt;
use uuid::Uuid;

use testrun_backend::services::credentials::{
    generate_api_key_secret, generate_salt, hash_secret,
};
use testrun_backend::services::tokens::TokenService;
use testrun_backend::storage::database::Database;
use testrun_backend::storage::models::{NewTestcase, SessionRow, TestcaseStatus, UserRow};
use testrun_backend::{app, AppState};

pub const TEST_JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

pub async fn test_app() -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database should open");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations should apply");

    let db = Database::new(pool);
    let state = Arc::new(AppState {
        db: db.clone(),
        tokens: TokenService::new(TEST_JWT_SECRET),
    });
    TestApp { app: app(state), db }
}

// ==================== Seed Helpers ====================

pub async fn create_user(db: &Database, username: &str, password: &str) -> UserRow {
    let salt = generate_salt();
    let hash = hash_secret(password, &salt);
    db.create_user(username, &salt, &hash)
        .await
        .expect("user should insert")
}

/// Mint a valid access token without going through the login endpoint.
pub fn access_token_for(user_id: &str) -> String {
    TokenService::new(TEST_JWT_SECRET)
        .issue_pair(user_id)
        .expect("pair should issue")
        .access_token
}

pub fn refresh_token_for(user_id: &str) -> String {
    TokenService::new(TEST_JWT_SECRET)
        .issue_pair(user_id)
        .expect("pair should issue")
        .refresh_token
}

/// Create an API key row and return it with the `X-API-Key` header value.
pub async fn create_api_key(db: &Database, user_id: &str) -> (String, String) {
    let secret = generate_api_key_secret();
    let salt = generate_salt();
    let hash = hash_secret(&secret, &salt);
    let row = db
        .create_api_key(user_id, None, &salt, &hash)
        .await
        .expect("api key should insert");
    let header = STANDARD.encode(
        serde_json::json!({ "apiKeyId": row.id, "apiKeySecret": secret }).to_string(),
    );
    (row.id, header)
}

pub async fn create_session(db: &Database, user_id: &str) -> SessionRow {
    db.create_session(&Uuid::new_v4().to_string(), None, None, user_id)
        .await
        .expect("session should insert")
}

/// Insert one testcase and return its id.
pub async fn create_testcase(
    db: &Database,
    session: &SessionRow,
    status: TestcaseStatus,
) -> String {
    create_named_testcase(db, session, status, "test_case").await
}

pub async fn create_named_testcase(
    db: &Database,
    session: &SessionRow,
    status: TestcaseStatus,
    name: &str,
) -> String {
    let ids = db
        .insert_testcases(&[NewTestcase {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            status,
            name: name.to_string(),
            classname: None,
            file: None,
            testsuite: None,
            output: None,
            baggage: None,
        }])
        .await
        .expect("testcase should insert");
    ids.into_iter().next().expect("one id should come back")
}

pub async fn create_label(
    db: &Database,
    session: &SessionRow,
    key: &str,
    value: Option<&str>,
) {
    db.insert_labels(
        &session.id,
        &session.user_id,
        &[(key.to_string(), value.map(str::to_string))],
    )
    .await
    .expect("label should insert");
}

// ==================== Request Helpers ====================

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

pub async fn api_get(
    app: &Router,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::empty()).expect("request should build");
    send(app, request).await
}

pub async fn api_post(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, request).await
}

/// POST to an ingress endpoint with an `X-API-Key` header.
pub async fn ingress_post(
    app: &Router,
    uri: &str,
    api_key: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-api-key", api_key)
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, request).await
}

pub async fn api_delete(
    app: &Router,
    uri: &str,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

/// URL-encode a query parameter value.
pub fn urlencode(raw: &str) -> String {
    let mut encoded = String::new();
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
