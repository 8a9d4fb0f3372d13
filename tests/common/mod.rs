//! Shared helpers for the integration tests.
//!
//! Each test file is compiled as its own crate, so helpers used by only one
//! of them would otherwise warn as dead code.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use tasktrack::repository::{InMemoryTaskRepository, SqliteTaskRepository, TaskRepository};
use tasktrack::server::{router, AppState};

/// Router backed by a fresh in-memory repository.
pub fn create_test_app() -> Router {
    router(AppState::new(Arc::new(InMemoryTaskRepository::new())))
}

/// Router backed by a fresh in-memory SQLite database.
pub async fn create_sqlite_app() -> Router {
    let repository: Arc<dyn TaskRepository> = Arc::new(
        SqliteTaskRepository::connect("sqlite::memory:")
            .await
            .expect("Failed to open SQLite database"),
    );
    router(AppState::new(repository))
}

/// Serves a fresh in-memory app on an ephemeral port and returns its base URL.
pub async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = listener.local_addr().expect("Failed to read local address");
    let app = create_test_app();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    format!("http://{address}")
}

/// Sends one request through the router, returning the status and the JSON body
/// (`Value::Null` for an empty body).
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => Request::builder().method(method).uri(uri).body(Body::empty()),
    }
    .expect("Failed to build request");

    send_request(app, request).await
}

pub async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response body is not JSON")
    };
    (status, json)
}
