//! Ingress/Callback/Control service.
//!
//! Owns the submitter-facing task API (`/api/v1/tasks_json`,
//! `/api/v1/tasks_form`, `/api/v1/tasks/{id}` family) and the internal
//! callback that the worker runtime posts to when an inference finishes.
//! Per DESIGN.md's Open Question decisions, this is the sole writer of
//! terminal task state.

pub mod auth;
pub mod dto;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/v1/tasks_json", post(routes::submit::tasks_json))
        .route("/api/v1/tasks_form", post(routes::submit::tasks_form))
        .route("/api/v1/tasks/{task_id}", get(routes::query::get_task))
        .route("/api/v1/tasks/{task_id}", delete(routes::query::delete_task))
        .route(
            "/api/v1/tasks/{task_id}/status",
            get(routes::query::get_task_status),
        )
        .route(
            "/api/v1/tasks/{task_id}/result",
            get(routes::query::get_task_result),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    let internal = Router::new().route(
        "/api/v1/internal/task-callback",
        post(routes::callback::task_callback),
    );

    Router::new()
        .merge(public)
        .merge(internal)
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
