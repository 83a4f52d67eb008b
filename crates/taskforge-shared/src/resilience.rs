//! A small circuit breaker wrapped around each outbound data-plane client,
//! matching the teacher's resilience module in shape (closed/open/half-open,
//! consecutive-failure threshold, cooldown before probing half-open). This
//! is additive hardening: it never changes the status-DAG or retry-count
//! semantics owned by the ICC callback handler.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Lock-free circuit breaker: consecutive failures trip it open; after the
/// cooldown elapses, the next call is let through as a half-open probe.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    consecutive_failures: AtomicU32,
    opened_at_millis: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            consecutive_failures: AtomicU32::new(0),
            opened_at_millis: AtomicU64::new(0),
        }
    }

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    pub fn state(&self) -> BreakerState {
        let opened_at = self.opened_at_millis.load(Ordering::SeqCst);
        if opened_at == 0 {
            return BreakerState::Closed;
        }
        let elapsed = Self::now_millis().saturating_sub(opened_at);
        if elapsed >= self.config.cooldown.as_millis() as u64 {
            BreakerState::HalfOpen
        } else {
            BreakerState::Open
        }
    }

    /// Whether a call should be allowed through right now.
    pub fn allow(&self) -> bool {
        !matches!(self.state(), BreakerState::Open)
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.opened_at_millis.store(0, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.config.failure_threshold {
            // Re-arm the open window on every failure at/after threshold so a
            // half-open probe that fails immediately re-opens for a full cooldown.
            self.opened_at_millis.store(Self::now_millis(), Ordering::SeqCst);
        }
    }

    /// Run `op` if the breaker allows it, recording the outcome. Returns
    /// `Err(BreakerOpen)` without invoking `op` when the circuit is open.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow() {
            return Err(BreakerCallError::Open);
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerCallError::Inner(e))
            }
        }
    }
}

#[derive(Debug)]
pub enum BreakerCallError<E> {
    Open,
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerCallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "circuit breaker open"),
            Self::Inner(e) => write!(f, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(60),
        });
        for _ in 0..2 {
            let result: Result<(), BreakerCallError<&str>> =
                breaker.call(|| async { Err("boom") }).await;
            assert!(result.is_err());
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        let result: Result<(), BreakerCallError<&str>> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(BreakerCallError::Open)));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(60),
        });
        let _: Result<(), BreakerCallError<&str>> = breaker.call(|| async { Err("boom") }).await;
        let _: Result<(), BreakerCallError<&str>> = breaker.call(|| async { Ok(()) }).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_opens_after_cooldown() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(10),
        });
        let _: Result<(), BreakerCallError<&str>> = breaker.call(|| async { Err("boom") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.allow());
    }
}
