//! `GET /health` — reports reachability of each backing dependency rather
//! than just process liveness, per SPEC_FULL.md §10.6's supplemented
//! health-dependency table (the source has no equivalent endpoint; this is
//! an addition grounded in the spec's ambient-stack expansion).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Serialize)]
struct DependencyHealth {
    name: &'static str,
    healthy: bool,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let tss_healthy = state.tss.get_task("__health_check__").await.is_ok();
    let tq_healthy = state.tq.health_check().await;
    let os_healthy = state.object_store.health_check().await;

    let deps = vec![
        DependencyHealth {
            name: "task_state_store",
            healthy: tss_healthy,
        },
        DependencyHealth {
            name: "task_queue",
            healthy: tq_healthy,
        },
        DependencyHealth {
            name: "object_store",
            healthy: os_healthy,
        },
    ];
    let all_healthy = deps.iter().all(|d| d.healthy);

    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({ "status": if all_healthy { "ok" } else { "degraded" }, "dependencies": deps }))).into_response()
}
