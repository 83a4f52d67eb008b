//! Worker HTTP surface: `/status`, `/api/v1/supported-tasks`,
//! `POST /api/v1/tasks`, `/health`. Grounded on
//! `original_source/services/model_forwarder/routes.py`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use taskforge_shared::models::TaskEnvelope;

use crate::runtime::AcceptError;
use crate::state::AppState;

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runtime.status().await)
}

pub async fn supported_tasks(State(state): State<AppState>) -> impl IntoResponse {
    let task_types = state.runtime.supported_task_types();
    Json(json!({
        "task_types": task_types,
        "count": task_types.len(),
        "service": "model-forwarder",
        "instance_id": state.config.worker.instance_id,
    }))
}

pub async fn receive_task(State(state): State<AppState>, Json(envelope): Json<TaskEnvelope>) -> Response {
    if envelope.callback.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Missing required field: callback"})),
        )
            .into_response();
    }

    let task_id = envelope.task_id.clone();
    match state.runtime.accept(envelope).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "accepted",
                "task_id": task_id,
                "message": "Task accepted and queued for inference",
            })),
        )
            .into_response(),
        Err(AcceptError::ShuttingDown) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"detail": "Forwarder is shutting down, not accepting new tasks"})),
        )
            .into_response(),
        Err(AcceptError::Busy) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"detail": "Forwarder is busy processing another task"})),
        )
            .into_response(),
        Err(AcceptError::ChannelClosed) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "inference loop unavailable"})),
        )
            .into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "service": "model-forwarder"}))
}
