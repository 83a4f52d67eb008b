//! `POST /api/v1/tasks_json` and `POST /api/v1/tasks_form`, grounded on
//! `original_source/services/api_gateway/routes.py::create_task_json` /
//! `create_task_form`.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use std::collections::HashMap;

use taskforge_shared::error::TaskforgeError;
use taskforge_shared::models::{
    generate_task_id, CallbackConfig, LogLevel, ModelSpec, TaskEnvelope, TaskRecord, TaskStatus,
};

use crate::dto::{TaskRequest, TaskResponse};
use crate::error::ApiError;
use crate::logging::{send_log, send_log_with_context};
use crate::normalize::normalize_payload;
use crate::state::AppState;

fn internal_callback(state: &AppState) -> CallbackConfig {
    let mut headers = HashMap::new();
    headers.insert(
        "Authorization".to_string(),
        format!("Bearer {}", state.config.icc.internal_key),
    );
    CallbackConfig {
        url: format!("{}/api/v1/internal/task-callback", state.config.icc.url),
        headers: Some(headers),
    }
}

#[allow(clippy::too_many_arguments)]
async fn publish_and_store(
    state: &AppState,
    task_id: String,
    task_type: String,
    model_spec: ModelSpec,
    payload: serde_json::Value,
    inference_params: Option<serde_json::Value>,
    callback: Option<CallbackConfig>,
) -> Result<TaskResponse, ApiError> {
    let now = Utc::now();
    let record = TaskRecord {
        task_id: task_id.clone(),
        task_type: task_type.clone(),
        model_spec: model_spec.clone(),
        payload: payload.clone(),
        inference_params: inference_params.clone(),
        callback,
        status: TaskStatus::Pending,
        result: None,
        error: None,
        last_error: None,
        retry_count: 0,
        max_retries: state.config.task.max_retries,
        created_at: now,
        updated_at: now,
    };

    let envelope = TaskEnvelope::from_record(&record, internal_callback(state));
    state
        .tss
        .set_task(&record, state.config.task.ttl_secs)
        .await
        .map_err(ApiError::from)?;
    state.tq.publish(&envelope).await.map_err(ApiError::from)?;

    Ok(TaskResponse {
        task_id,
        status: TaskStatus::Pending,
        message: "Task created successfully".to_string(),
    })
}

async fn finish(
    state: &AppState,
    task_id: &str,
    task_type: &str,
    result: Result<TaskResponse, ApiError>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    match result {
        Ok(resp) => {
            send_log_with_context(
                state,
                task_id,
                LogLevel::Info,
                "task.published",
                format!("Task {task_id} published"),
                Some(serde_json::json!({ "task_type": task_type })),
            )
            .await;
            Ok((StatusCode::CREATED, Json(resp)))
        }
        Err(e) => {
            send_log(
                state,
                task_id,
                LogLevel::Error,
                "task.create_failed",
                format!("failed to create task: {}", e.0),
            )
            .await;
            Err(e)
        }
    }
}

pub async fn tasks_json(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let task_id = generate_task_id();
    send_log(
        &state,
        &task_id,
        LogLevel::Info,
        "task.created",
        format!("Task {task_id} created"),
    )
    .await;

    let result = async {
        let payload = normalize_payload(&state.object_store, &task_id, &req.payload)
            .await
            .map_err(ApiError::from)?;
        publish_and_store(
            &state,
            task_id.clone(),
            req.task_type.clone(),
            req.model_spec.clone(),
            payload,
            req.inference_params.clone(),
            req.callback.clone(),
        )
        .await
    }
    .await;

    finish(&state, &task_id, &req.task_type, result).await
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::from(TaskforgeError::InvalidPayload(e.to_string())))
}

fn parse_json_field<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(raw)
        .map_err(|_| ApiError::from(TaskforgeError::InvalidPayload(format!("invalid {what} JSON"))))
}

pub async fn tasks_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let task_id = generate_task_id();
    send_log(
        &state,
        &task_id,
        LogLevel::Info,
        "task.created",
        format!("Task {task_id} created"),
    )
    .await;

    let mut task_type: Option<String> = None;
    let mut model_spec: Option<ModelSpec> = None;
    let mut payload = serde_json::Value::Object(Default::default());
    let mut inference_params: Option<serde_json::Value> = None;
    let mut callback: Option<CallbackConfig> = None;
    let mut file_entries: Vec<(String, String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from(TaskforgeError::InvalidPayload(e.to_string())))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or("file").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::from(TaskforgeError::InvalidPayload(e.to_string())))?;
                file_entries.push((filename, content_type, bytes.to_vec()));
            }
            "task_type" => task_type = Some(text_field(field).await?),
            "model_spec" => model_spec = Some(parse_json_field(&text_field(field).await?, "model_spec")?),
            "payload" => payload = parse_json_field(&text_field(field).await?, "payload")?,
            "inference_params" => {
                inference_params = Some(parse_json_field(&text_field(field).await?, "inference_params")?)
            }
            "callback" => callback = Some(parse_json_field(&text_field(field).await?, "callback")?),
            _ => {}
        }
    }

    let task_type = task_type
        .ok_or_else(|| ApiError::from(TaskforgeError::InvalidPayload("task_type is required".into())))?;
    let model_spec = model_spec
        .ok_or_else(|| ApiError::from(TaskforgeError::InvalidPayload("model_spec is required".into())))?;

    if !file_entries.is_empty() {
        let mut files_json = Vec::with_capacity(file_entries.len());
        for (filename, content_type, bytes) in file_entries {
            let safe_name = filename.replace(['/', '\\'], "_");
            let key = format!("tasks/{task_id}/inputs/{safe_name}");
            let size = bytes.len();
            let url = state
                .object_store
                .upload_bytes(&key, bytes, &content_type)
                .await
                .map_err(ApiError::from)?;
            files_json.push(serde_json::json!({
                "filename": filename,
                "url": url,
                "content_type": content_type,
                "size": size,
            }));
        }
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("files".to_string(), serde_json::Value::Array(files_json));
        }
    }

    let result = async {
        let payload = normalize_payload(&state.object_store, &task_id, &payload)
            .await
            .map_err(ApiError::from)?;
        publish_and_store(
            &state,
            task_id.clone(),
            task_type.clone(),
            model_spec,
            payload,
            inference_params,
            callback,
        )
        .await
    }
    .await;

    finish(&state, &task_id, &task_type, result).await
}
