//! Fire-and-forget log emission onto the Log Bus, mirroring `_send_log` in
//! `original_source/services/model_forwarder/routes.py` / `work.py`.

use taskforge_shared::clients::tq::LogBusClient;
use taskforge_shared::models::{LogEvent, LogLevel};

pub async fn send_log(
    log_bus: &LogBusClient,
    instance_id: &str,
    task_id: &str,
    level: LogLevel,
    event: &str,
    message: impl Into<String>,
) {
    send_log_with_context(log_bus, instance_id, task_id, level, event, message, None).await
}

pub async fn send_log_with_context(
    log_bus: &LogBusClient,
    instance_id: &str,
    task_id: &str,
    level: LogLevel,
    event: &str,
    message: impl Into<String>,
    context: Option<serde_json::Value>,
) {
    let mut log = LogEvent::new("model-forwarder", instance_id, level, task_id, event, message);
    if let Some(ctx) = context {
        log = log.with_context(ctx);
    }
    if let Err(e) = log_bus.publish(&log).await {
        tracing::warn!(error = %e, task_id, "failed to publish log event");
    }
}
