//! Error taxonomy shared by every Autoflow crate

use thiserror::Error;

/// Result type alias for automation operations
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Errors surfaced by workflow, approval and suggestion operations
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Malformed input to a create/update call; fix and resubmit
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested transition violates the lifecycle state machine
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The backend accepted the request but the external platform action failed
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Network failure or timeout; safe to retry with backoff
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record changed since it was read. Revisions are known when the
    /// caller supplied one; some backends report a conflict without them.
    #[error("Conflict: {}", conflict_detail(.expected, .actual))]
    Conflict {
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// Credentials missing or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-2xx answer from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn conflict_detail(expected: &Option<u64>, actual: &Option<u64>) -> String {
    match (expected, actual) {
        (Some(expected), Some(actual)) => {
            format!("expected revision {}, found {}", expected, actual)
        }
        _ => "the record changed since it was read".to_string(),
    }
}

impl AutomationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn conflict(expected: u64, actual: u64) -> Self {
        Self::Conflict {
            expected: Some(expected),
            actual: Some(actual),
        }
    }

    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", kind, id))
    }

    /// Only transient failures may be retried automatically
    pub fn is_retryable(&self) -> bool {
        matches!(self, AutomationError::Transient(_))
    }

    /// Whether the outcome of the request is unknown (it may have been applied)
    pub fn is_ambiguous(&self) -> bool {
        self.is_retryable()
    }

    /// Short machine-readable kind, used in logs and notices
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationError::Validation(_) => "validation",
            AutomationError::InvalidState(_) => "invalid_state",
            AutomationError::Delivery(_) => "delivery",
            AutomationError::Transient(_) => "transient",
            AutomationError::NotFound(_) => "not_found",
            AutomationError::Conflict { .. } => "conflict",
            AutomationError::Unauthorized(_) => "unauthorized",
            AutomationError::Api { .. } => "api",
            AutomationError::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(AutomationError::Transient("timeout".into()).is_retryable());
        assert!(!AutomationError::Delivery("platform down".into()).is_retryable());
        assert!(!AutomationError::invalid_state("terminal").is_retryable());
        assert!(!AutomationError::validation("name").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = AutomationError::conflict(2, 3);
        assert_eq!(err.to_string(), "Conflict: expected revision 2, found 3");
        assert_eq!(err.kind(), "conflict");

        let err = AutomationError::Conflict {
            expected: None,
            actual: None,
        };
        assert_eq!(err.to_string(), "Conflict: the record changed since it was read");

        let err = AutomationError::not_found("workflow", "wf-1");
        assert_eq!(err.to_string(), "Not found: workflow wf-1");
    }
}
