//! Shared plumbing for the client-side services

use autoflow_core::{AutomationBackend, AutomationConfig, AutomationError, Result};
use autoflow_infra::{CallPolicy, Idempotency};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::notify::{Notice, Notifier, TracingNotifier};

/// Backend handle, notice sink and call policy shared by every service
#[derive(Clone)]
pub struct ServiceContext {
    backend: Arc<dyn AutomationBackend>,
    notifier: Arc<dyn Notifier>,
    policy: CallPolicy,
}

impl ServiceContext {
    pub fn new(backend: Arc<dyn AutomationBackend>) -> Self {
        Self {
            backend,
            notifier: Arc::new(TracingNotifier),
            policy: CallPolicy::default(),
        }
    }

    /// Timeouts and retries taken from `config`
    pub fn from_config(backend: Arc<dyn AutomationBackend>, config: &AutomationConfig) -> Self {
        Self::new(backend).with_policy(CallPolicy::from_config(config))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backend(&self) -> &dyn AutomationBackend {
        self.backend.as_ref()
    }

    pub fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// Run a backend call under the policy. Failures are logged and
    /// surfaced as an error notice before being returned.
    pub(crate) async fn call<F, Fut, T>(
        &self,
        operation: &str,
        idempotency: Idempotency,
        call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.policy
            .run(operation, idempotency, call)
            .await
            .map_err(|err| self.report(operation, err))
    }

    /// Local validation failure, reported like a backend one
    pub(crate) fn reject_locally<T>(&self, operation: &str, err: AutomationError) -> Result<T> {
        Err(self.report(operation, err))
    }

    fn report(&self, operation: &str, err: AutomationError) -> AutomationError {
        warn!(operation, kind = err.kind(), error = %err, "Automation call failed");
        self.notifier.notify(Notice::error(describe(operation, &err)));
        err
    }
}

/// Human wording for a failed operation
fn describe(operation: &str, err: &AutomationError) -> String {
    let action = operation.replace('_', " ");
    match err {
        AutomationError::Validation(msg) => format!("Could not {}: {}", action, msg),
        AutomationError::InvalidState(msg) => format!("Cannot {}: {}", action, msg),
        AutomationError::Delivery(msg) => format!(
            "Delivery failed ({}). The approval is still pending; try sending again.",
            msg
        ),
        AutomationError::Transient(_) => {
            format!("Could not {}: the service is unreachable, try again shortly", action)
        }
        AutomationError::Conflict { .. } => {
            format!("Could not {}: it was changed elsewhere, reload and retry", action)
        }
        other => format!("Could not {}: {}", action, other),
    }
}
