//! `POST /api/v1/internal/task-callback` — the lifecycle pivot. Only
//! reachable by the shared internal secret (checked via `auth::
//! verify_internal_secret`, not the public bearer-token middleware).
//! Grounded on
//! `original_source/services/api_gateway/routes.py::task_callback`, with
//! the three Open Question decisions in DESIGN.md baked in: ICC is the
//! sole writer of terminal states, `GET /result` (not this route) does the
//! one-and-only delete-on-terminal-read, and timeouts never invoke the
//! submitter callback.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use taskforge_shared::error::TaskforgeError;
use taskforge_shared::models::{CallbackConfig, LogLevel, TaskEnvelope, TaskStatus};
use taskforge_shared::retry::{retry_with_backoff, BackoffPolicy, TimeoutElapsed};

use crate::auth::verify_internal_secret;
use crate::dto::TaskCallbackRequest;
use crate::error::ApiError;
use crate::logging::{send_log, send_log_with_context};
use crate::state::AppState;

#[derive(Debug)]
struct CallbackError(String);
impl From<TimeoutElapsed> for CallbackError {
    fn from(_: TimeoutElapsed) -> Self {
        CallbackError("timed out".to_string())
    }
}

async fn execute_user_callback(
    callback: &CallbackConfig,
    body: &serde_json::Value,
) -> Result<(), CallbackError> {
    let client = reqwest::Client::new();
    let result = retry_with_backoff(BackoffPolicy::default(), |_attempt| {
        let client = client.clone();
        let url = callback.url.clone();
        let headers = callback.headers.clone().unwrap_or_default();
        let body = body.clone();
        async move {
            let mut req = client.post(&url).json(&body);
            for (k, v) in headers {
                req = req.header(k, v);
            }
            let resp = req.send().await.map_err(|e| CallbackError(e.to_string()))?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(CallbackError(format!("HTTP {}", resp.status())))
            }
        }
    })
    .await;
    result
}

pub async fn task_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TaskCallbackRequest>,
) -> Result<Response, ApiError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    if !verify_internal_secret(auth_header, &state.config.icc.internal_key) {
        return Err(ApiError::from(TaskforgeError::InvalidInternalSecret));
    }

    let task_id = req.task_id.clone();
    let mut task = state
        .tss
        .get_task(&task_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::from(TaskforgeError::TaskNotFound {
                task_id: task_id.clone(),
            })
        })?;

    let now = Utc::now();
    let elapsed_secs = (now - task.created_at).num_seconds();
    let max_wait = state.config.task.max_wait_time_secs;

    if elapsed_secs > max_wait {
        task.status = TaskStatus::Failed;
        let mut error = format!("Timeout after {elapsed_secs}s");
        if req.status == TaskStatus::Failed {
            if let Some(e) = &req.error {
                error.push_str(": ");
                error.push_str(e);
            }
        }
        task.error = Some(error);
        task.updated_at = now;
        let _ = state.tss.delete_task(&task_id).await;

        send_log_with_context(
            &state,
            &task_id,
            LogLevel::Error,
            "task.timeout",
            format!("Task {task_id} exceeded max wait time, discarded"),
            Some(json!({"elapsed_seconds": elapsed_secs, "max_wait_time": max_wait})),
        )
        .await;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "status": "timeout",
                "task_id": task_id,
                "message": format!("Task exceeded max wait time ({elapsed_secs}s), discarded"),
            })),
        )
            .into_response());
    }

    if req.status == TaskStatus::Success {
        task.status = TaskStatus::Success;
        task.result = req.result.clone();
        task.updated_at = now;
        state
            .tss
            .set_task(&task, state.config.task.ttl_secs)
            .await
            .map_err(ApiError::from)?;

        send_log_with_context(
            &state,
            &task_id,
            LogLevel::Info,
            "task.completed",
            format!("Task {task_id} completed successfully"),
            Some(json!({
                "result_keys": req
                    .result
                    .as_ref()
                    .and_then(|r| r.as_object())
                    .map(|m| m.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default(),
            })),
        )
        .await;

        if let Some(callback) = task.callback.clone() {
            let body = json!({
                "task_id": task_id,
                "status": "SUCCESS",
                "result": task.result,
            });
            if execute_user_callback(&callback, &body).await.is_err() {
                send_log(
                    &state,
                    &task_id,
                    LogLevel::Error,
                    "callback.user_failed",
                    format!("user callback failed for task {task_id}"),
                )
                .await;
            }
        }

        let _ = state.tss.delete_task(&task_id).await;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "task_id": task_id,
                "message": "Task completed and user notified",
            })),
        )
            .into_response());
    }

    // Failure branch: either exhaust retries or resubmit.
    if task.retry_count >= task.max_retries {
        task.status = TaskStatus::Failed;
        task.error = Some(format!(
            "Max retries exceeded ({}): {}",
            task.max_retries,
            req.error.clone().unwrap_or_default()
        ));
        task.last_error = req.error.clone();
        task.updated_at = now;
        state
            .tss
            .set_task(&task, state.config.task.ttl_secs)
            .await
            .map_err(ApiError::from)?;

        send_log_with_context(
            &state,
            &task_id,
            LogLevel::Error,
            "task.max_retries_exceeded",
            format!("Task {task_id} exceeded max retries"),
            Some(json!({"retry_count": task.retry_count, "error": req.error})),
        )
        .await;

        if let Some(callback) = task.callback.clone() {
            let body = json!({
                "task_id": task_id,
                "status": "FAILED",
                "error": task.error,
            });
            let _ = execute_user_callback(&callback, &body).await;
        }

        let _ = state.tss.delete_task(&task_id).await;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "status": "failed",
                "task_id": task_id,
                "message": "Task failed after max retries",
            })),
        )
            .into_response());
    }

    task.retry_count += 1;
    task.last_error = req.error.clone();
    task.updated_at = now;
    state
        .tss
        .set_task(&task, state.config.task.ttl_secs)
        .await
        .map_err(ApiError::from)?;

    send_log_with_context(
        &state,
        &task_id,
        LogLevel::Warning,
        "task.retrying",
        format!(
            "Retrying task {task_id} (attempt {}/{})",
            task.retry_count, task.max_retries
        ),
        Some(json!({"retry_count": task.retry_count, "error": req.error})),
    )
    .await;

    let envelope = TaskEnvelope::from_record(
        &task,
        task.callback.clone().unwrap_or(CallbackConfig {
            url: format!("{}/api/v1/internal/task-callback", state.config.icc.url),
            headers: None,
        }),
    );
    state.tq.publish(&envelope).await.map_err(ApiError::from)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "retrying",
            "task_id": task_id,
            "retry_count": task.retry_count,
            "message": format!("Task resubmitted for retry (attempt {}/{})", task.retry_count, task.max_retries),
        })),
    )
        .into_response())
}
