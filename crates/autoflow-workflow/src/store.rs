//! Workflow definitions: the store and the board's optimistic toggle

use autoflow_core::{
    AutomationError, Execution, NewWorkflow, Result, Workflow, WorkflowId, WorkflowPatch,
    WorkflowStatus,
};
use autoflow_infra::Idempotency;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, instrument, warn};

use crate::context::ServiceContext;
use crate::notify::Notice;

/// Create, read, edit and transition workflow definitions
#[derive(Clone)]
pub struct WorkflowStore {
    ctx: ServiceContext,
}

impl WorkflowStore {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a workflow; it starts as `draft` unless the definition says otherwise
    #[instrument(skip(self, definition), fields(name = %definition.name))]
    pub async fn create(&self, definition: NewWorkflow) -> Result<Workflow> {
        if let Err(err) = definition.validate() {
            return self.ctx.reject_locally("create_workflow", err);
        }

        let workflow = self
            .ctx
            .call("create_workflow", Idempotency::Command, || {
                self.ctx.backend().create_workflow(definition.clone())
            })
            .await?;

        info!(workflow_id = %workflow.id, "Workflow created");
        self.ctx
            .notify(Notice::success(format!("Workflow '{}' created", workflow.name)));
        Ok(workflow)
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    pub async fn get(&self, id: &WorkflowId) -> Result<Workflow> {
        self.ctx
            .call("get_workflow", Idempotency::Idempotent, || {
                self.ctx.backend().get_workflow(id)
            })
            .await
    }

    /// Workflows in creation order, optionally filtered by exact status
    #[instrument(skip(self))]
    pub async fn list(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        self.ctx
            .call("list_workflows", Idempotency::Idempotent, || {
                self.ctx.backend().list_workflows(status)
            })
            .await
    }

    /// Edit the definition. Status never changes here.
    #[instrument(skip(self, patch), fields(workflow_id = %id))]
    pub async fn update(&self, id: &WorkflowId, patch: WorkflowPatch) -> Result<Workflow> {
        if let Err(err) = patch.validate() {
            return self.ctx.reject_locally("update_workflow", err);
        }

        let workflow = self
            .ctx
            .call("update_workflow", Idempotency::Command, || {
                self.ctx.backend().update_workflow(id, patch.clone())
            })
            .await?;

        self.ctx
            .notify(Notice::success(format!("Workflow '{}' saved", workflow.name)));
        Ok(workflow)
    }

    /// `draft|paused -> active`; a no-op when already active
    #[instrument(skip(self), fields(workflow_id = %id))]
    pub async fn activate(&self, id: &WorkflowId) -> Result<Workflow> {
        let workflow = self.apply(id, WorkflowStatus::Active).await?;
        self.ctx
            .notify(Notice::success(format!("Workflow '{}' is active", workflow.name)));
        Ok(workflow)
    }

    /// `active -> paused`
    #[instrument(skip(self), fields(workflow_id = %id))]
    pub async fn pause(&self, id: &WorkflowId) -> Result<Workflow> {
        let workflow = self.apply(id, WorkflowStatus::Paused).await?;
        self.ctx
            .notify(Notice::success(format!("Workflow '{}' paused", workflow.name)));
        Ok(workflow)
    }

    /// The raw execution log, in backend order
    #[instrument(skip(self), fields(workflow_id = %id))]
    pub async fn executions(&self, id: &WorkflowId) -> Result<Vec<Execution>> {
        self.ctx
            .call("list_executions", Idempotency::Idempotent, || {
                self.ctx.backend().list_executions(id)
            })
            .await
    }

    /// Move a workflow to `target` without posting a success notice.
    ///
    /// Transitions are retried on transient failures. A retry that hits
    /// `InvalidState` may be looking at the change an earlier, lost attempt
    /// already made, so the workflow is re-read and accepted when it sits at
    /// `target`.
    async fn apply(&self, id: &WorkflowId, target: WorkflowStatus) -> Result<Workflow> {
        let operation = match target {
            WorkflowStatus::Active => "activate_workflow",
            WorkflowStatus::Paused => "pause_workflow",
            WorkflowStatus::Draft => {
                return Err(AutomationError::invalid_state(
                    "workflows cannot be moved back to draft",
                ))
            }
        };

        let attempts = AtomicU32::new(0);
        self.ctx
            .call(operation, Idempotency::Idempotent, || {
                let retried = attempts.fetch_add(1, Ordering::SeqCst) > 0;
                let backend = self.ctx.backend();
                async move {
                    let result = match target {
                        WorkflowStatus::Paused => backend.pause_workflow(id).await,
                        _ => backend.activate_workflow(id).await,
                    };
                    match result {
                        Err(AutomationError::InvalidState(msg)) if retried => {
                            let current = backend.get_workflow(id).await?;
                            if current.status == target {
                                debug!(
                                    workflow_id = %id,
                                    status = %target,
                                    "Transition landed on an earlier attempt"
                                );
                                Ok(current)
                            } else {
                                Err(AutomationError::InvalidState(msg))
                            }
                        }
                        other => other,
                    }
                }
            })
            .await
    }
}

/// A list view of workflows with an optimistic active/paused toggle
///
/// The view is only a projection of the last server answer. A toggle writes
/// the tentative status into the view, issues the command and, on failure,
/// replaces it with the server's record. When the failure leaves the outcome
/// unknown the board re-reads the workflow and, if the change did land,
/// replays the inverse command so server and view agree again.
pub struct WorkflowBoard {
    store: WorkflowStore,
    view: RwLock<Vec<Workflow>>,
}

impl WorkflowBoard {
    pub fn new(store: WorkflowStore) -> Self {
        Self {
            store,
            view: RwLock::new(Vec::new()),
        }
    }

    /// Replace the view with the server's list
    pub async fn refresh(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        let workflows = self.store.list(status).await?;
        *self.view.write() = workflows.clone();
        Ok(workflows)
    }

    pub fn view(&self) -> Vec<Workflow> {
        self.view.read().clone()
    }

    pub fn find(&self, id: &WorkflowId) -> Option<Workflow> {
        self.view.read().iter().find(|w| &w.id == id).cloned()
    }

    /// Flip `active <-> paused` (drafts are activated)
    #[instrument(skip(self), fields(workflow_id = %id))]
    pub async fn toggle(&self, id: &WorkflowId) -> Result<Workflow> {
        let prior = self
            .find(id)
            .ok_or_else(|| AutomationError::not_found("workflow", id))?;
        let target = if prior.is_active() {
            WorkflowStatus::Paused
        } else {
            WorkflowStatus::Active
        };

        self.put(Workflow {
            status: target,
            ..prior.clone()
        });

        match self.store.apply(id, target).await {
            Ok(workflow) => {
                self.put(workflow.clone());
                Ok(workflow)
            }
            Err(err) => {
                self.put(prior.clone());
                if err.is_ambiguous() {
                    self.compensate(&prior, target).await;
                } else {
                    self.reload(&prior.id).await;
                }
                let status = self.find(id).map_or(prior.status, |w| w.status);
                self.store.ctx.notify(Notice::info(format!(
                    "Workflow '{}' is {}",
                    prior.name, status
                )));
                Err(err)
            }
        }
    }

    /// Undo a transition that may have been applied despite the error
    async fn compensate(&self, prior: &Workflow, target: WorkflowStatus) {
        let current = match self.store.get(&prior.id).await {
            Ok(current) => current,
            Err(err) => {
                warn!(workflow_id = %prior.id, error = %err, "Could not verify toggle outcome");
                return;
            }
        };

        // Compensation never moves a workflow back to draft
        if current.status != target || prior.status == WorkflowStatus::Draft {
            self.put(current);
            return;
        }

        info!(workflow_id = %prior.id, status = %target, "Toggle was applied, replaying inverse");
        match self.store.apply(&prior.id, prior.status).await {
            Ok(restored) => self.put(restored),
            Err(err) => {
                warn!(workflow_id = %prior.id, error = %err, "Inverse command failed");
                self.put(current);
            }
        }
    }

    /// Replace the view's record with the server's after a definite refusal
    async fn reload(&self, id: &WorkflowId) {
        match self.store.get(id).await {
            Ok(current) => self.put(current),
            Err(err) => {
                warn!(workflow_id = %id, error = %err, "Could not reload workflow after failed toggle")
            }
        }
    }

    fn put(&self, workflow: Workflow) {
        let mut view = self.view.write();
        match view.iter_mut().find(|w| w.id == workflow.id) {
            Some(slot) => *slot = workflow,
            None => view.push(workflow),
        }
    }
}
