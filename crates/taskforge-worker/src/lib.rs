//! Worker Runtime service.
//!
//! Advertises the task types it can execute via `registry`, accepts at most
//! one inbound task at a time through `runtime`, and exposes that state
//! over the small HTTP surface in `routes`. `registration` handles joining
//! and leaving the Service Registry.

pub mod logging;
pub mod registration;
pub mod registry;
pub mod routes;
pub mod runtime;
pub mod state;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(routes::status))
        .route("/api/v1/supported-tasks", get(routes::supported_tasks))
        .route("/api/v1/tasks", post(routes::receive_task))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(65)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
