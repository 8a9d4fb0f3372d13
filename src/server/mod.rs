//! HTTP surface of the task service.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::repository::TaskRepository;
use crate::service::TaskService;

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiErrorResponse};

/// Shared application dependencies.
#[derive(Clone)]
pub struct AppState {
    pub service: TaskService,
}

impl AppState {
    pub fn new(repository: Arc<dyn TaskRepository>) -> Self {
        Self {
            service: TaskService::new(repository),
        }
    }
}

/// Builds the application router with tracing and permissive CORS, so a
/// browser front-end on another origin can call it.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .patch(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
