//! Discover candidate workers, probe each concurrently, and pick the best
//! one for a task type. Grounded on
//! `original_source/services/task_scheduler/main.py::_discover_forwarders`
//! / `_get_forwarder_status` / `_get_supported_tasks` / `_select_forwarder`.

use futures::future::join_all;
use serde::Deserialize;

use taskforge_shared::clients::sr::ServiceRegistry;
use taskforge_shared::models::WorkerDescriptor;

const WORKER_SERVICE_NAME: &str = "model-forwarder";

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    busy: bool,
    #[serde(default)]
    pending_tasks_count: u32,
}

#[derive(Debug, Deserialize)]
struct SupportedTasksResponse {
    #[serde(default)]
    task_types: Vec<String>,
}

/// Probes `/status` and `/api/v1/supported-tasks` on one worker and fills
/// in `busy`/`pending_count`/`supported_task_types`. Any probe failure is
/// treated as "this worker is not a candidate right now", never as a hard
/// error — a single unreachable worker must not abort discovery.
async fn probe(http: &reqwest::Client, mut worker: WorkerDescriptor) -> Option<WorkerDescriptor> {
    let base = worker.base_url();

    let supported = http
        .get(format!("{base}/api/v1/supported-tasks"))
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
        .ok()?
        .json::<SupportedTasksResponse>()
        .await
        .ok()?;
    worker.supported_task_types = supported.task_types;

    let status = http
        .get(format!("{base}/status"))
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
        .ok()?
        .json::<StatusResponse>()
        .await
        .ok()?;
    worker.busy = status.busy;
    worker.pending_count = status.pending_tasks_count;

    Some(worker)
}

/// Selection policy: prefer an idle worker with the lowest pending count;
/// otherwise fall back to the busy worker with the lowest pending count,
/// capped at `max_pending`. Returns `None` if nothing qualifies — the
/// caller requeues and the task waits.
pub fn select(candidates: Vec<WorkerDescriptor>, task_type: &str, max_pending: u32) -> Option<WorkerDescriptor> {
    let mut supporting: Vec<WorkerDescriptor> = candidates
        .into_iter()
        .filter(|w| w.supports(task_type))
        .collect();

    let idle_pos = supporting
        .iter()
        .enumerate()
        .filter(|(_, w)| !w.busy)
        .min_by_key(|(_, w)| w.pending_count)
        .map(|(i, _)| i);
    if let Some(i) = idle_pos {
        return Some(supporting.remove(i));
    }

    supporting
        .into_iter()
        .filter(|w| w.pending_count <= max_pending)
        .min_by_key(|w| w.pending_count)
}

pub async fn discover_and_select(
    registry: &ServiceRegistry,
    http: &reqwest::Client,
    task_type: &str,
    max_pending: u32,
) -> Option<WorkerDescriptor> {
    let discovered = registry.discover(WORKER_SERVICE_NAME).await.ok()?;
    if discovered.is_empty() {
        tracing::info!("no {WORKER_SERVICE_NAME} instances registered");
        return None;
    }

    let probed = join_all(discovered.into_iter().map(|w| probe(http, w)))
        .await
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    select(probed, task_type, max_pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: &str, pending: u32, busy: bool, types: &[&str]) -> WorkerDescriptor {
        WorkerDescriptor {
            service_id: id.to_string(),
            address: "10.0.0.1".to_string(),
            port: 8100,
            supported_task_types: types.iter().map(|s| s.to_string()).collect(),
            busy,
            pending_count: pending,
        }
    }

    #[test]
    fn prefers_idle_worker_with_lowest_pending() {
        let candidates = vec![
            worker("busy-1", 1, true, &["openai-gpt5"]),
            worker("idle-1", 3, false, &["openai-gpt5"]),
            worker("idle-2", 1, false, &["openai-gpt5"]),
        ];
        let selected = select(candidates, "openai-gpt5", 2).unwrap();
        assert_eq!(selected.service_id, "idle-2");
    }

    #[test]
    fn falls_back_to_low_load_busy_worker() {
        let candidates = vec![
            worker("busy-1", 2, true, &["openai-gpt5"]),
            worker("busy-2", 5, true, &["openai-gpt5"]),
        ];
        let selected = select(candidates, "openai-gpt5", 2).unwrap();
        assert_eq!(selected.service_id, "busy-1");
    }

    #[test]
    fn returns_none_when_all_overloaded() {
        let candidates = vec![worker("busy-1", 10, true, &["openai-gpt5"])];
        assert!(select(candidates, "openai-gpt5", 2).is_none());
    }

    #[test]
    fn filters_out_unsupported_task_types() {
        let candidates = vec![worker("idle-1", 0, false, &["other-type"])];
        assert!(select(candidates, "openai-gpt5", 2).is_none());
    }
}
