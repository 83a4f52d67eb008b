//! Fire-and-forget log emission onto the Log Bus, mirroring `_send_log` in
//! `original_source/services/api_gateway/routes.py`: failures here must
//! never fail the surrounding request, only get logged locally.

use taskforge_shared::models::{LogEvent, LogLevel};

use crate::state::AppState;

pub async fn send_log(state: &AppState, task_id: &str, level: LogLevel, event: &str, message: impl Into<String>) {
    send_log_with_context(state, task_id, level, event, message, None).await
}

pub async fn send_log_with_context(
    state: &AppState,
    task_id: &str,
    level: LogLevel,
    event: &str,
    message: impl Into<String>,
    context: Option<serde_json::Value>,
) {
    let mut log = LogEvent::new("icc", "", level, task_id, event, message);
    if let Some(ctx) = context {
        log = log.with_context(ctx);
    }
    if let Err(e) = state.log_bus.publish(&log).await {
        tracing::warn!(error = %e, task_id, "failed to publish log event");
    }
}
