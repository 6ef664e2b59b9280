//! Resilience patterns for backend calls
//!
//! Every call runs under a timeout. Idempotent calls are additionally
//! retried on transient failure; commands run exactly once.

pub mod retry;
pub mod timeout;

pub use retry::{retry, retry_with, RetryConfig, RetryPolicy};
pub use timeout::{TimeoutError, TimeoutPolicy};

use autoflow_core::{AutomationConfig, AutomationError};
use std::future::Future;
use std::time::Duration;

/// Whether repeating a call is safe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Reads, activate, pause, preference writes
    Idempotent,
    /// send, reject, accept, mute, create
    Command,
}

/// Timeout plus retry, applied per call
#[derive(Debug, Clone, Default)]
pub struct CallPolicy {
    retry: RetryPolicy,
    timeout: TimeoutPolicy,
}

impl CallPolicy {
    pub fn new(retry: RetryPolicy, timeout: TimeoutPolicy) -> Self {
        Self { retry, timeout }
    }

    pub fn from_config(config: &AutomationConfig) -> Self {
        Self::new(
            RetryPolicy::from_settings(&config.retry),
            TimeoutPolicy::from_config(&config.api),
        )
    }

    /// No retries and the given deadline
    pub fn single_attempt(timeout: Duration) -> Self {
        Self::new(RetryPolicy::no_retry(), TimeoutPolicy::new(timeout))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn timeout_policy(&self) -> &TimeoutPolicy {
        &self.timeout
    }

    /// Run `operation`, retrying only when it is idempotent
    pub async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        idempotency: Idempotency,
        mut operation: F,
    ) -> Result<T, AutomationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        match idempotency {
            Idempotency::Command => self.timeout.guard(operation_name, operation()).await,
            Idempotency::Idempotent => {
                let timeout = &self.timeout;
                retry(&self.retry, move || timeout.guard(operation_name, operation())).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> CallPolicy {
        CallPolicy::new(
            RetryPolicy::fixed(2, Duration::from_millis(1)),
            TimeoutPolicy::new(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn test_idempotent_calls_are_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("get_workflow", Idempotency::Idempotent, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AutomationError::Transient("reset".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_commands_run_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("send_approval", Idempotency::Command, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AutomationError::Transient("reset".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeouts_count_as_transient_and_are_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .run("list_approvals", Idempotency::Idempotent, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AutomationError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
