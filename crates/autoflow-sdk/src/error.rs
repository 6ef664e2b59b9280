//! Mapping of HTTP failures onto the automation error taxonomy
//!
//! Error bodies are not uniform: some endpoints answer with
//! `{"error": "..."}`, others with `{"message": ..., "code": ...}` or
//! `{"detail": ...}`, and proxies sometimes return plain text.

use autoflow_core::AutomationError;
use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Parsed view of an error body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ErrorBody {
    pub message: String,
    pub code: Option<String>,
}

impl ErrorBody {
    pub(crate) fn parse(status: StatusCode, body: &str) -> Self {
        let fallback = || {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.trim().to_string()
            }
        };

        let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
            return Self {
                message: fallback(),
                code: None,
            };
        };

        let from_error = envelope.error.and_then(|e| match e {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from),
            _ => None,
        });

        Self {
            message: from_error
                .or(envelope.message)
                .or(envelope.detail)
                .unwrap_or_else(fallback),
            code: envelope.code,
        }
    }
}

/// Classify a non-2xx response
pub(crate) fn from_status(status: StatusCode, body: &str) -> AutomationError {
    let ErrorBody { message, code } = ErrorBody::parse(status, body);

    match code.as_deref() {
        Some("delivery_failed") => return AutomationError::Delivery(message),
        Some("conflict") => {
            let (expected, actual) = revisions(body);
            return AutomationError::Conflict { expected, actual };
        }
        _ => {}
    }

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AutomationError::Validation(message)
        }
        StatusCode::CONFLICT => AutomationError::InvalidState(message),
        StatusCode::NOT_FOUND => AutomationError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AutomationError::Unauthorized(message),
        StatusCode::BAD_GATEWAY => AutomationError::Delivery(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AutomationError::Transient(message)
        }
        _ if status.is_server_error() => AutomationError::Transient(message),
        _ => AutomationError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn revisions(body: &str) -> (Option<u64>, Option<u64>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, None);
    };
    let field = |name: &str| value.get(name).and_then(|v| v.as_u64());
    (field("expected_revision"), field("actual_revision"))
}

/// Classify a transport-level failure (connect, timeout, body decode)
pub(crate) fn from_transport(err: reqwest::Error) -> AutomationError {
    if err.is_decode() {
        return AutomationError::Api {
            status: err.status().map(|s| s.as_u16()).unwrap_or(200),
            message: format!("malformed response body: {}", err),
        };
    }
    if err.is_timeout() {
        return AutomationError::Transient(format!("request timed out: {}", err));
    }
    if let Some(status) = err.status() {
        return from_status(status, &err.to_string());
    }
    AutomationError::Transient(err.to_string())
}
