//! Append-only execution log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AutomationError, Result};
use crate::types::{ExecutionId, WorkflowId};

/// Outcome of one workflow run attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Immutable record of a workflow run. `error` is present iff the run failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    /// Inputs that triggered the run
    #[serde(default)]
    pub context: Value,
    /// Outputs and side effects
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    pub fn completed(workflow_id: WorkflowId, context: Value, result: Value) -> Self {
        Self::record(workflow_id, ExecutionStatus::Completed, context, result, None)
    }

    pub fn skipped(workflow_id: WorkflowId, context: Value, result: Value) -> Self {
        Self::record(workflow_id, ExecutionStatus::Skipped, context, result, None)
    }

    pub fn failed(workflow_id: WorkflowId, context: Value, error: impl Into<String>) -> Self {
        Self::record(
            workflow_id,
            ExecutionStatus::Failed,
            context,
            Value::Null,
            Some(error.into()),
        )
    }

    fn record(
        workflow_id: WorkflowId,
        status: ExecutionStatus,
        context: Value,
        result: Value,
        error: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ExecutionId::generate(),
            workflow_id,
            status,
            context,
            result,
            error,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the error/status pairing of a record received from elsewhere
    pub fn validate(&self) -> Result<()> {
        match (self.status, &self.error) {
            (ExecutionStatus::Failed, None) => Err(AutomationError::validation(format!(
                "failed execution {} carries no error",
                self.id
            ))),
            (ExecutionStatus::Completed | ExecutionStatus::Skipped, Some(_)) => {
                Err(AutomationError::validation(format!(
                    "{} execution {} carries an error",
                    self.status, self.id
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Rollup of a workflow's execution log, used for auditing and retry decisions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub last_error: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// The most recent run failed
    pub needs_attention: bool,
}

impl ExecutionStats {
    pub fn from_log(executions: &[Execution]) -> Self {
        let mut stats = Self::default();
        let mut latest: Option<&Execution> = None;

        for execution in executions {
            stats.total += 1;
            match execution.status {
                ExecutionStatus::Completed => stats.completed += 1,
                ExecutionStatus::Failed => stats.failed += 1,
                ExecutionStatus::Skipped => stats.skipped += 1,
            }
            if latest.map_or(true, |l| execution.created_at >= l.created_at) {
                latest = Some(execution);
            }
        }

        stats.last_error = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .max_by_key(|e| e.created_at)
            .and_then(|e| e.error.clone());
        stats.last_run_at = latest.map(|e| e.created_at);
        stats.needs_attention = latest.map_or(false, |e| e.status == ExecutionStatus::Failed);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_error_iff_failed() {
        let wf = WorkflowId::new("wf-1");
        assert!(Execution::completed(wf.clone(), json!({}), json!({"tags": ["urgent"]}))
            .validate()
            .is_ok());
        assert!(Execution::failed(wf.clone(), json!({}), "template error").validate().is_ok());

        let mut broken = Execution::skipped(wf, json!({}), json!({}));
        broken.error = Some("oops".into());
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_stats_rollup() {
        let wf = WorkflowId::new("wf-1");
        let mut first = Execution::failed(wf.clone(), json!({}), "boom");
        first.created_at = Utc::now() - Duration::minutes(5);
        let second = Execution::completed(wf.clone(), json!({}), json!({}));
        let third = Execution::skipped(wf, json!({}), json!({}));

        let stats = ExecutionStats::from_log(&[first, second, third]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.last_error.as_deref(), Some("boom"));
        assert!(!stats.needs_attention);
    }

    #[test]
    fn test_stats_flags_latest_failure() {
        let wf = WorkflowId::new("wf-1");
        let mut ok = Execution::completed(wf.clone(), json!({}), json!({}));
        ok.created_at = Utc::now() - Duration::minutes(1);
        let failed = Execution::failed(wf, json!({}), "platform unavailable");

        let stats = ExecutionStats::from_log(&[ok, failed]);
        assert!(stats.needs_attention);
        assert!(ExecutionStats::from_log(&[]).last_run_at.is_none());
    }
}
