//! Call Guard
//!
//! Bounds every backend call: a semaphore caps in-flight requests per
//! adapter, each attempt gets a timeout, and `BackendUnavailable` failures are
//! retried with exponential backoff. Other errors are returned immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use agent_core::error::{AgentError, Result};
use agent_core::provider::AdapterConfig;
use tokio::sync::Semaphore;

/// Concurrency, timeout and retry policy for one adapter
#[derive(Clone, Debug)]
pub struct CallGuard {
    permits: Arc<Semaphore>,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl CallGuard {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            timeout: config.timeout,
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` under the policy; `what` names the operation in logs
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.backoff;
        let mut attempt = 0u32;

        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| AgentError::BackendUnavailable(format!("semaphore closed: {e}")))?;

                match tokio::time::timeout(self.timeout, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::BackendUnavailable(format!(
                        "{what} timed out after {}ms",
                        self.timeout.as_millis()
                    ))),
                }
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation = what,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying backend call"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guard(retries: u32) -> CallGuard {
        CallGuard::new(
            &AdapterConfig::default()
                .max_retries(retries)
                .retry_backoff(Duration::from_millis(1))
                .timeout(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn test_retries_unavailable_then_succeeds() {
        let attempts = AtomicUsize::new(0);
        let result = guard(2)
            .run("test", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AgentError::BackendUnavailable("503".into()))
                } else {
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = guard(1)
            .run("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AgentError::BackendUnavailable("down".into()))
            })
            .await;
        assert!(matches!(result, Err(AgentError::BackendUnavailable(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_authentication_is_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = guard(3)
            .run("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AgentError::Authentication("401".into()))
            })
            .await;
        assert!(matches!(result, Err(AgentError::Authentication(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_unavailable() {
        let result: Result<()> = guard(0)
            .run("slow call", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        match result {
            Err(AgentError::BackendUnavailable(msg)) => {
                assert!(msg.contains("slow call timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_calls_never_exceed_limit() {
        const LIMIT: usize = 3;
        let guard = CallGuard::new(
            &AdapterConfig::default()
                .max_concurrency(LIMIT)
                .timeout(Duration::from_secs(5)),
        );
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let calls: Vec<_> = (0..12)
            .map(|i| {
                let guard = guard.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    guard
                        .run("bounded", || {
                            let in_flight = Arc::clone(&in_flight);
                            let peak = Arc::clone(&peak);
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok(i)
                            }
                        })
                        .await
                })
            })
            .collect();

        for call in calls {
            call.await.unwrap().unwrap();
        }
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= LIMIT, "peak {peak} exceeded {LIMIT}");
        assert!(peak > 1, "calls never overlapped");
    }
}
