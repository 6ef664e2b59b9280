//! Read-only view over a workflow's execution log

use autoflow_core::{Execution, ExecutionStats, ExecutionStatus, Result, WorkflowId};

use crate::store::WorkflowStore;

#[derive(Clone)]
pub struct ExecutionLog {
    store: WorkflowStore,
}

impl ExecutionLog {
    pub fn new(store: WorkflowStore) -> Self {
        Self { store }
    }

    /// Most recent first, at most `limit` entries
    pub async fn recent(&self, workflow_id: &WorkflowId, limit: Option<usize>) -> Result<Vec<Execution>> {
        let mut executions = self.store.executions(workflow_id).await?;
        sort_recent_first(&mut executions);
        if let Some(limit) = limit {
            executions.truncate(limit);
        }
        Ok(executions)
    }

    /// Failed runs only, most recent first
    pub async fn failures(&self, workflow_id: &WorkflowId) -> Result<Vec<Execution>> {
        let mut failed: Vec<Execution> = self
            .store
            .executions(workflow_id)
            .await?
            .into_iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .collect();
        sort_recent_first(&mut failed);
        Ok(failed)
    }

    pub async fn stats(&self, workflow_id: &WorkflowId) -> Result<ExecutionStats> {
        let executions = self.store.executions(workflow_id).await?;
        Ok(ExecutionStats::from_log(&executions))
    }
}

// Stable, so runs sharing a timestamp keep log order reversed
fn sort_recent_first(executions: &mut [Execution]) {
    executions.reverse();
    executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::Value;

    #[test]
    fn test_sort_recent_first() {
        let wf = WorkflowId::new("wf-1");
        let base = Utc::now();
        let mut log: Vec<Execution> = (0..3)
            .map(|i| {
                let mut e = Execution::completed(wf.clone(), Value::Null, Value::from(i));
                e.created_at = base + Duration::seconds(i);
                e
            })
            .collect();
        log.push({
            let mut tie = Execution::skipped(wf.clone(), Value::Null, Value::from(3));
            tie.created_at = base + Duration::seconds(2);
            tie
        });

        sort_recent_first(&mut log);
        let order: Vec<i64> = log.iter().map(|e| e.result.as_i64().unwrap()).collect();
        assert_eq!(order, vec![3, 2, 1, 0]);
    }
}
