//! `GET /tasks/{id}`, `/status`, `/result`, `DELETE /tasks/{id}`. Grounded
//! on `original_source/services/api_gateway/routes.py::get_task`,
//! `get_task_status`, `get_task_result`, `delete_task`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use taskforge_shared::error::TaskforgeError;
use taskforge_shared::models::TaskRecord;

use crate::error::ApiError;
use crate::state::AppState;

async fn fetch(state: &AppState, task_id: &str) -> Result<TaskRecord, ApiError> {
    state
        .tss
        .get_task(task_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::from(TaskforgeError::TaskNotFound {
                task_id: task_id.to_string(),
            })
        })
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    Ok(Json(fetch(&state, &task_id).await?))
}

#[derive(Serialize)]
pub struct TaskStatusResponse {
    task_id: String,
    status: taskforge_shared::models::TaskStatus,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task = fetch(&state, &task_id).await?;
    Ok(Json(TaskStatusResponse {
        task_id,
        status: task.status,
        created_at: task.created_at,
        updated_at: task.updated_at,
    }))
}

#[derive(Serialize)]
pub struct TaskResultResponse {
    task_id: String,
    status: taskforge_shared::models::TaskStatus,
    result: Option<serde_json::Value>,
}

/// Deletes the task's TSS record on a terminal read (DESIGN.md Open
/// Question 2, matching the source). Still-pending/processing tasks are
/// reported with 202 and left untouched.
pub async fn get_task_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    use taskforge_shared::models::TaskStatus;

    let task = fetch(&state, &task_id).await?;
    if !task.status.is_terminal() {
        return Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "task_id": task_id,
                "status": task.status,
                "detail": "task is still in progress",
            })),
        )
            .into_response());
    }

    let _ = state.tss.delete_task(&task_id).await;

    if task.status == TaskStatus::Failed {
        return Err(ApiError::from(TaskforgeError::InferenceFailed(
            task.error.unwrap_or_else(|| "unknown error".to_string()),
        )));
    }

    Ok((
        StatusCode::OK,
        Json(TaskResultResponse {
            task_id,
            status: task.status,
            result: task.result,
        }),
    )
        .into_response())
}

#[derive(Serialize)]
pub struct DeleteResponse {
    task_id: String,
    message: String,
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<(StatusCode, Json<DeleteResponse>), ApiError> {
    fetch(&state, &task_id).await?;
    state.tss.delete_task(&task_id).await.map_err(ApiError::from)?;
    Ok((
        StatusCode::OK,
        Json(DeleteResponse {
            task_id,
            message: "Task deleted successfully".to_string(),
        }),
    ))
}
