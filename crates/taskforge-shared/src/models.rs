//! Wire and state types shared by all three services: `TaskRecord` (the
//! authoritative TSS record), `TaskEnvelope` (the TQ message),
//! `WorkerDescriptor` (SR entry + probe result), and `LogEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl TaskStatus {
    /// Whether this status is a member of `{SUCCESS, FAILED}`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Authoritative per-task state in the Task State Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub task_type: String,
    pub model_spec: ModelSpec,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackConfig>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// §3-inv-3: `result` non-null iff SUCCESS, `error` non-null iff FAILED.
    pub fn satisfies_result_error_invariant(&self) -> bool {
        let result_ok = (self.status == TaskStatus::Success) == self.result.is_some();
        let error_ok = (self.status == TaskStatus::Failed) == self.error.is_some();
        result_ok && error_ok
    }
}

/// Generate a fresh globally unique task id.
pub fn generate_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// The queue-message projection of a task. `callback` here is always the
/// ICC-internal callback, never the submitter's — see spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: String,
    pub task_type: String,
    pub model_spec: ModelSpec,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackConfig>,
}

impl TaskEnvelope {
    pub fn from_record(record: &TaskRecord, internal_callback: CallbackConfig) -> Self {
        Self {
            task_id: record.task_id.clone(),
            task_type: record.task_type.clone(),
            model_spec: record.model_spec.clone(),
            payload: record.payload.clone(),
            inference_params: record.inference_params.clone(),
            callback: Some(internal_callback),
        }
    }
}

/// A Service Registry entry, enriched by probing `/status` and
/// `/supported-tasks` on the advertised address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub service_id: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub supported_task_types: Vec<String>,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub pending_count: u32,
}

impl WorkerDescriptor {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    pub fn supports(&self, task_type: &str) -> bool {
        self.supported_task_types.iter().any(|t| t == task_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub service_name: String,
    pub service_instance: String,
    pub level: LogLevel,
    pub event: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        service_name: impl Into<String>,
        service_instance: impl Into<String>,
        level: LogLevel,
        task_id: impl Into<String>,
        event: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id: task_id.into(),
            service_name: service_name.into(),
            service_instance: service_instance.into(),
            level,
            event: event.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(status: TaskStatus) -> TaskRecord {
        TaskRecord {
            task_id: generate_task_id(),
            task_type: "text:generation".into(),
            model_spec: ModelSpec {
                name: "gpt-5".into(),
                endpoint: None,
                api_key: None,
                version: None,
            },
            payload: serde_json::json!({"prompt": "hi"}),
            inference_params: None,
            callback: None,
            status,
            result: None,
            error: None,
            last_error: None,
            retry_count: 0,
            max_retries: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_record_satisfies_invariant() {
        assert!(sample_record(TaskStatus::Pending).satisfies_result_error_invariant());
    }

    #[test]
    fn success_without_result_violates_invariant() {
        assert!(!sample_record(TaskStatus::Success).satisfies_result_error_invariant());
    }

    #[test]
    fn failed_with_error_satisfies_invariant() {
        let mut record = sample_record(TaskStatus::Failed);
        record.error = Some("boom".into());
        assert!(record.satisfies_result_error_invariant());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }

    #[test]
    fn envelope_carries_internal_callback_not_submitter() {
        let mut record = sample_record(TaskStatus::Pending);
        record.callback = Some(CallbackConfig {
            url: "http://submitter/cb".into(),
            headers: None,
        });
        let internal = CallbackConfig {
            url: "http://icc/internal/task-callback".into(),
            headers: None,
        };
        let envelope = TaskEnvelope::from_record(&record, internal.clone());
        assert_eq!(envelope.callback.unwrap().url, internal.url);
    }

    #[test]
    fn worker_descriptor_base_url_and_support() {
        let worker = WorkerDescriptor {
            service_id: "w1".into(),
            address: "10.0.0.1".into(),
            port: 8080,
            supported_task_types: vec!["openai-gpt5".into()],
            busy: false,
            pending_count: 0,
        };
        assert_eq!(worker.base_url(), "http://10.0.0.1:8080");
        assert!(worker.supports("openai-gpt5"));
        assert!(!worker.supports("other"));
    }
}
