//! Bounded depth-1 task channel, current-task pointer, inference loop and
//! callback coroutine. Grounded on
//! `original_source/services/model_forwarder/main.py` (lifespan/shutdown),
//! `routes.py` (`receive_task`, `process_result_callback`,
//! `_execute_callback_with_retry`) and `work.py` (`inference_worker`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use taskforge_shared::clients::tq::LogBusClient;
use taskforge_shared::models::{CallbackConfig, LogLevel, TaskEnvelope};
use taskforge_shared::retry::{retry_with_backoff, BackoffPolicy, TimeoutElapsed};

use crate::logging::{send_log, send_log_with_context};
use crate::registry::InferenceRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct CurrentTask {
    pub task_id: String,
    pub task_type: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub busy: bool,
    pub current_task: Option<CurrentTask>,
    pub pending_tasks_count: u32,
}

#[derive(Debug)]
pub enum AcceptError {
    ShuttingDown,
    Busy,
    ChannelClosed,
}

/// One slot of concurrency. `accept` is the only entry point that mutates
/// `current`; the inference loop clears it when a task finishes, so the
/// invariant "at most one task in flight" holds across both sides.
pub struct WorkerRuntime {
    registry: InferenceRegistry,
    tx: mpsc::Sender<TaskEnvelope>,
    current: Arc<Mutex<Option<CurrentTask>>>,
    shutting_down: Arc<AtomicBool>,
}

impl WorkerRuntime {
    pub fn start(registry: InferenceRegistry, log_bus: Arc<LogBusClient>, instance_id: String) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(1);
        let current = Arc::new(Mutex::new(None));
        let shutting_down = Arc::new(AtomicBool::new(false));

        tokio::spawn(inference_loop(
            registry.clone(),
            log_bus,
            instance_id,
            rx,
            current.clone(),
        ));

        Arc::new(Self {
            registry,
            tx,
            current,
            shutting_down,
        })
    }

    pub fn supported_task_types(&self) -> Vec<String> {
        self.registry.task_types()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> StatusSnapshot {
        let current = self.current.lock().await.clone();
        let pending = if current.is_some() {
            1 - self.tx.capacity() as u32
        } else {
            0
        };
        StatusSnapshot {
            busy: current.is_some(),
            current_task: current,
            pending_tasks_count: pending,
        }
    }

    /// Required-field validation plus the busy/shutdown checks, then hands
    /// the envelope to the inference loop. Returns as soon as the task is
    /// queued, never waiting on inference itself.
    pub async fn accept(&self, envelope: TaskEnvelope) -> Result<(), AcceptError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(AcceptError::ShuttingDown);
        }

        let mut guard = self.current.lock().await;
        if guard.is_some() {
            return Err(AcceptError::Busy);
        }
        *guard = Some(CurrentTask {
            task_id: envelope.task_id.clone(),
            task_type: envelope.task_type.clone(),
            started_at: Utc::now(),
        });
        drop(guard);

        if self.tx.send(envelope).await.is_err() {
            *self.current.lock().await = None;
            return Err(AcceptError::ChannelClosed);
        }
        Ok(())
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Polls `current` until it clears or `max_wait` elapses, mirroring the
    /// source's half-second poll loop in its lifespan shutdown handler.
    pub async fn wait_for_drain(&self, max_wait: Duration) {
        let start = std::time::Instant::now();
        loop {
            if self.current.lock().await.is_none() {
                return;
            }
            if start.elapsed() >= max_wait {
                tracing::warn!("task still processing after drain window, forcing shutdown");
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

async fn inference_loop(
    registry: InferenceRegistry,
    log_bus: Arc<LogBusClient>,
    instance_id: String,
    mut rx: mpsc::Receiver<TaskEnvelope>,
    current: Arc<Mutex<Option<CurrentTask>>>,
) {
    let http = reqwest::Client::new();

    while let Some(envelope) = rx.recv().await {
        let task_id = envelope.task_id.clone();

        send_log_with_context(
            &log_bus,
            &instance_id,
            &task_id,
            LogLevel::Info,
            "inference.started",
            format!("Started inference for task {task_id}"),
            Some(json!({"task_type": envelope.task_type, "model": envelope.model_spec.name})),
        )
        .await;

        let outcome = match registry.get(&envelope.task_type) {
            Some(inference_fn) => {
                inference_fn(
                    envelope.model_spec.clone(),
                    envelope.payload.clone(),
                    envelope.inference_params.clone(),
                )
                .await
            }
            None => Err(format!(
                "no inference function registered for task_type: {}",
                envelope.task_type
            )),
        };

        let result_packet = match outcome {
            Ok(output) => json!({
                "task_id": task_id,
                "status": "SUCCESS",
                "result": {
                    "output": output,
                    "model": envelope.model_spec.name,
                    "timestamp": Utc::now(),
                },
            }),
            Err(e) => {
                send_log(
                    &log_bus,
                    &instance_id,
                    &task_id,
                    LogLevel::Error,
                    "inference.failed",
                    format!("Inference failed for task {task_id}: {e}"),
                )
                .await;
                json!({"task_id": task_id, "status": "FAILED", "error": e})
            }
        };

        if let Some(callback) = &envelope.callback {
            run_callback(&http, &log_bus, &instance_id, &task_id, callback, &result_packet).await;
        } else {
            tracing::warn!(task_id, "no callback configured, discarding inference result");
        }

        *current.lock().await = None;
    }
}

#[derive(Debug)]
struct CallbackError(String);
impl From<TimeoutElapsed> for CallbackError {
    fn from(_: TimeoutElapsed) -> Self {
        CallbackError("timed out".to_string())
    }
}

async fn run_callback(
    http: &reqwest::Client,
    log_bus: &LogBusClient,
    instance_id: &str,
    task_id: &str,
    callback: &CallbackConfig,
    body: &serde_json::Value,
) {
    let result = retry_with_backoff(BackoffPolicy::default(), |attempt| {
        let http = http.clone();
        let url = callback.url.clone();
        let headers = callback.headers.clone().unwrap_or_default();
        let body = body.clone();
        async move {
            let mut req = http.post(&url).json(&body);
            for (k, v) in headers {
                req = req.header(k, v);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| CallbackError(format!("attempt {attempt}: {e}")))?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(CallbackError(format!(
                    "attempt {attempt}: HTTP {}",
                    resp.status()
                )))
            }
        }
    })
    .await;

    match result {
        Ok(()) => {
            send_log(
                log_bus,
                instance_id,
                task_id,
                LogLevel::Info,
                "callback.success",
                format!("Successfully called back for task {task_id}"),
            )
            .await;
        }
        Err(CallbackError(detail)) => {
            send_log_with_context(
                log_bus,
                instance_id,
                task_id,
                LogLevel::Error,
                "callback.all_retries_failed",
                format!("All callback retries failed for task {task_id}"),
                Some(json!({"detail": detail})),
            )
            .await;
        }
    }
}
