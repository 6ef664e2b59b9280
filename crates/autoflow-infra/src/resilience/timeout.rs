//! Timeout handling
//!
//! Every backend call runs under a deadline. An elapsed deadline leaves the
//! outcome unknown, so it surfaces as a transient failure.

use autoflow_core::{ApiConfig, AutomationError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeout error
#[derive(Debug, Clone)]
pub struct TimeoutError {
    /// Duration that was exceeded
    pub duration: Duration,
    /// Operation name
    pub operation: String,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Operation '{}' timed out after {:?}",
            self.operation, self.duration
        )
    }
}

impl std::error::Error for TimeoutError {}

impl From<TimeoutError> for AutomationError {
    fn from(err: TimeoutError) -> Self {
        AutomationError::Transient(err.to_string())
    }
}

/// Timeout policy configuration
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub default_timeout: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default())
    }
}

impl TimeoutPolicy {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.timeout())
    }

    /// Execute an operation with the default timeout
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, TimeoutError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match tokio::time::timeout(self.default_timeout, operation()).await {
            Ok(result) => Ok(result),
            Err(_) => {
                warn!(
                    operation = operation_name,
                    timeout_ms = self.default_timeout.as_millis() as u64,
                    "Operation timed out"
                );
                Err(TimeoutError {
                    duration: self.default_timeout,
                    operation: operation_name.to_string(),
                })
            }
        }
    }

    /// Execute a fallible automation call, folding an elapsed deadline into
    /// `AutomationError::Transient`
    pub async fn call<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, AutomationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        self.guard(operation_name, operation()).await
    }

    /// Same as [`TimeoutPolicy::call`] for an already constructed future
    pub async fn guard<Fut, T>(&self, operation_name: &str, future: Fut) -> Result<T, AutomationError>
    where
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        self.execute(operation_name, || future).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let policy = TimeoutPolicy::default();
        let result = policy.execute("test", || async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_exceeded() {
        let policy = TimeoutPolicy::new(Duration::from_millis(10));

        let result = policy
            .execute("slow_operation", || async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                42
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.operation, "slow_operation");
        assert_eq!(err.duration, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_call_maps_elapsed_to_transient() {
        let policy = TimeoutPolicy::new(Duration::from_millis(10));

        let result: Result<(), _> = policy
            .call("list_approvals", || async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AutomationError::Transient(_))));
    }

    #[tokio::test]
    async fn test_call_passes_inner_errors_through() {
        let policy = TimeoutPolicy::new(Duration::from_secs(1));

        let result: Result<(), _> = policy
            .call("send_approval", || async {
                Err(AutomationError::Delivery("platform down".into()))
            })
            .await;

        assert!(matches!(result, Err(AutomationError::Delivery(_))));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = TimeoutPolicy::from_config(&ApiConfig::default().with_timeout(5));
        assert_eq!(policy.default_timeout, Duration::from_secs(5));
    }
}
