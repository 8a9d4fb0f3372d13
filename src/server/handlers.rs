//! Handlers for the `/tasks` resource.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiErrorResponse;
use super::AppState;
use crate::models::{StatusFilter, Task};
use crate::validation::{validate_new_task, validate_task_patch};

type ApiResult<T> = Result<T, ApiErrorResponse>;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /tasks?status=all|pending|completed`
pub async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Task>>> {
    let Query(query) = query?;
    let filter = StatusFilter::parse_lenient(query.status.as_deref());
    let tasks = state.service.list_tasks(filter).await?;
    Ok(Json(tasks))
}

/// `GET /tasks/{id}`
pub async fn get_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Task>> {
    let Path(id) = id?;
    let task = state.service.get_task(id).await?;
    Ok(Json(task))
}

/// `POST /tasks`
pub async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(body) = body?;
    let new_task = validate_new_task(&body).inspect_err(|error| {
        tracing::debug!(%error, "rejected create payload");
    })?;
    let task = state.service.create_task(new_task).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PATCH /tasks/{id}`
pub async fn update_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let patch = validate_task_patch(&body).inspect_err(|error| {
        tracing::debug!(id, %error, "rejected update payload");
    })?;
    let task = state.service.update_task(id, patch).await?;
    Ok(Json(task))
}

/// `DELETE /tasks/{id}`
pub async fn delete_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.service.delete_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
