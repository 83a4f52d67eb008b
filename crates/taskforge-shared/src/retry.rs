//! Shared retry/backoff helper used by the submitter callback (ICC) and the
//! worker result callback, both of which are retried up to 3 times (4 total
//! attempts) with delays `[2s, 4s, 8s]` and a 30s per-attempt timeout in
//! `original_source`.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub delays: [Duration; 3],
    pub attempt_timeout: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            delays: [
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ],
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt_index: u32) -> Duration {
        let idx = (attempt_index as usize).min(self.delays.len() - 1);
        self.delays[idx]
    }
}

/// Run `op` up to `policy.max_attempts` times, each attempt bounded by
/// `policy.attempt_timeout`, sleeping `policy.delays[attempt]` between
/// attempts. Returns the last error if every attempt fails or times out.
/// `op` is re-invoked fresh on each attempt since it must produce a new
/// future each time.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TimeoutElapsed>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_err = Some(e),
            Err(_) => last_err = Some(E::from(TimeoutElapsed)),
        }
        if attempt + 1 < policy.max_attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutElapsed;

impl std::fmt::Display for TimeoutElapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attempt timed out")
    }
}

impl std::error::Error for TimeoutElapsed {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError(String);
    impl From<TimeoutElapsed> for TestError {
        fn from(_: TimeoutElapsed) -> Self {
            TestError("timed out".into())
        }
    }

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 4,
            delays: [
                Duration::from_millis(1),
                Duration::from_millis(1),
                Duration::from_millis(1),
            ],
            attempt_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<u32, TestError> = retry_with_backoff(fast_policy(), move |_attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<u32, TestError> = retry_with_backoff(fast_policy(), move |attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(TestError("transient".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<u32, TestError> = retry_with_backoff(fast_policy(), move |_attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError("always fails".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
