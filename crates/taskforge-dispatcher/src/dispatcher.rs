//! The consume-and-dispatch loop. Grounded on
//! `original_source/services/task_scheduler/main.py::TaskScheduler.start`
//! / `_process_task_message` / `_schedule_task` / `stop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskforge_shared::clients::sr::ServiceRegistry;
use taskforge_shared::clients::tq::{ConsumeOutcome, TaskQueueClient};
use taskforge_shared::clients::tss::TaskStateStore;
use taskforge_shared::config::DispatcherConfig;
use taskforge_shared::models::{TaskEnvelope, WorkerDescriptor};
use taskforge_shared::resilience::{BreakerCallError, CircuitBreaker, CircuitBreakerConfig};

use crate::worker_select::discover_and_select;

const CONSUMER_TAG: &str = "taskforge-dispatcher";

/// Shared shutdown flag: set by the bin's shutdown handler, read by the
/// consume handler so in-flight dispatch work can finish before the
/// process exits rather than being cut off mid-request.
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: ServiceRegistry,
    tss: TaskStateStore,
    http: reqwest::Client,
    shutting_down: Arc<AtomicBool>,
    /// Trips after repeated dispatch failures across any worker, so a run
    /// of unreachable workers fails fast instead of paying the full POST
    /// timeout on every envelope. Additive hardening only — never changes
    /// the ack/requeue decision itself.
    dispatch_breaker: CircuitBreaker,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, registry: ServiceRegistry, tss: TaskStateStore) -> Self {
        Self {
            config,
            registry,
            tss,
            http: reqwest::Client::new(),
            shutting_down: Arc::new(AtomicBool::new(false)),
            dispatch_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutting_down.clone()
    }

    pub async fn run(&self, tq: &TaskQueueClient) -> taskforge_shared::error::TaskforgeResult<()> {
        tq.consume(1, CONSUMER_TAG, |envelope| self.handle(envelope))
            .await
    }

    async fn handle(&self, envelope: TaskEnvelope) -> ConsumeOutcome {
        if self.shutting_down.load(Ordering::SeqCst) {
            tracing::info!(task_id = %envelope.task_id, "shutting down, requeueing undispatched task");
            return ConsumeOutcome::RejectRequeue;
        }

        let worker = discover_and_select(
            &self.registry,
            &self.http,
            &envelope.task_type,
            self.config.max_pending_tasks,
        )
        .await;

        let Some(worker) = worker else {
            tracing::warn!(task_id = %envelope.task_id, task_type = %envelope.task_type, "no available worker, retrying later");
            self.wait_retry_delay().await;
            return ConsumeOutcome::RejectRequeue;
        };

        let outcome = self
            .dispatch_breaker
            .call(|| self.dispatch_to(&worker, &envelope))
            .await;

        match outcome {
            Ok(true) => {
                if let Err(e) = self.tss.try_mark_processing(&envelope.task_id).await {
                    tracing::warn!(task_id = %envelope.task_id, error = %e, "best-effort PROCESSING mark failed");
                }
                tracing::info!(task_id = %envelope.task_id, worker = %worker.service_id, "dispatched");
                ConsumeOutcome::Ack
            }
            Ok(false) => {
                tracing::warn!(task_id = %envelope.task_id, worker = %worker.service_id, "worker busy, retrying later");
                self.wait_retry_delay().await;
                ConsumeOutcome::RejectRequeue
            }
            Err(BreakerCallError::Inner(e)) => {
                tracing::error!(task_id = %envelope.task_id, worker = %worker.service_id, error = %e, "dispatch failed, retrying later");
                self.wait_retry_delay().await;
                ConsumeOutcome::RejectRequeue
            }
            Err(BreakerCallError::Open) => {
                tracing::warn!(task_id = %envelope.task_id, "dispatch circuit breaker open, retrying later");
                self.wait_retry_delay().await;
                ConsumeOutcome::RejectRequeue
            }
        }
    }

    /// Posts the envelope to the worker's intake endpoint. `Ok(true)` on
    /// 200/201 (accepted), `Ok(false)` on 503 (busy, try another worker
    /// later), `Err` on anything else or a transport failure.
    async fn dispatch_to(
        &self,
        worker: &WorkerDescriptor,
        envelope: &TaskEnvelope,
    ) -> Result<bool, reqwest::Error> {
        let resp = self
            .http
            .post(format!("{}/api/v1/tasks", worker.base_url()))
            .json(envelope)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        match resp.status().as_u16() {
            200 | 201 => Ok(true),
            503 => Ok(false),
            status => {
                tracing::error!(status, "worker rejected dispatch");
                Ok(false)
            }
        }
    }

    async fn wait_retry_delay(&self) {
        tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_starts_clear() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.load(Ordering::SeqCst));
        flag.store(true, Ordering::SeqCst);
        assert!(flag.load(Ordering::SeqCst));
    }
}
