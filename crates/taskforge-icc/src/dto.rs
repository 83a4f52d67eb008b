//! Wire DTOs for the submitter-facing API. Distinct from
//! `taskforge_shared::models::TaskRecord`, which is the stored-state shape —
//! these are what clients actually send and receive.

use serde::{Deserialize, Serialize};

use taskforge_shared::models::{CallbackConfig, ModelSpec, TaskStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct TaskRequest {
    pub task_type: String,
    pub model_spec: ModelSpec,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub inference_params: Option<serde_json::Value>,
    #[serde(default)]
    pub callback: Option<CallbackConfig>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskCallbackRequest {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}
