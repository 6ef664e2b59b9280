//! In-process reference engine
//!
//! `InMemoryBackend` implements the full backend contract authoritatively:
//! it owns the workflow, approval, execution and suggestion stores, enforces
//! every lifecycle rule and runs active workflows against inbound events.
//! Used for local runs and as the backend in service tests.

pub mod delivery;
pub mod dispatch;

pub use delivery::{Delivered, DeliveryChannel, LogChannel, RecordingChannel};
pub use dispatch::{get_json_path, render_template, run_workflow, trigger_matches, InboundEvent, RunOutcome};

use async_trait::async_trait;
use autoflow_core::{
    Approval, ApprovalId, ApprovalPatch, ApprovalStatus, AutomationBackend, AutomationError,
    Execution, MuteRule, NewApproval, NewWorkflow, NotificationPrefs, Result, Suggestion,
    SuggestionId, SuggestionSummary, Workflow, WorkflowId, WorkflowPatch, WorkflowStatus,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A live suggestion and the approval it becomes when accepted
#[derive(Debug, Clone)]
struct QueuedSuggestion {
    suggestion: Suggestion,
    draft: NewApproval,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Creation order
    workflows: Vec<Workflow>,
    approvals: Vec<Approval>,
    /// Append-only
    executions: Vec<Execution>,
    suggestions: Vec<QueuedSuggestion>,
    mutes: HashSet<MuteRule>,
    prefs: NotificationPrefs,
    unread: u32,
}

impl MemoryState {
    fn workflow(&self, id: &WorkflowId) -> Result<&Workflow> {
        self.workflows
            .iter()
            .find(|w| &w.id == id)
            .ok_or_else(|| AutomationError::not_found("workflow", id))
    }

    fn workflow_mut(&mut self, id: &WorkflowId) -> Result<&mut Workflow> {
        self.workflows
            .iter_mut()
            .find(|w| &w.id == id)
            .ok_or_else(|| AutomationError::not_found("workflow", id))
    }

    fn approval_mut(&mut self, id: &ApprovalId) -> Result<&mut Approval> {
        self.approvals
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| AutomationError::not_found("approval", id))
    }

    fn approval(&self, id: &ApprovalId) -> Result<&Approval> {
        self.approvals
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| AutomationError::not_found("approval", id))
    }

    fn enqueue(&mut self, draft: NewApproval) -> Result<Approval> {
        let approval = Approval::from_draft(ApprovalId::generate(), draft, Utc::now())?;
        self.approvals.push(approval.clone());
        Ok(approval)
    }

    fn is_muted(&self, suggestion: &Suggestion) -> bool {
        self.mutes.iter().any(|m| m.covers(suggestion))
    }

    fn suggestion_index(&self, id: &SuggestionId) -> Result<usize> {
        self.suggestions
            .iter()
            .position(|q| &q.suggestion.id == id)
            .ok_or_else(|| AutomationError::not_found("suggestion", id))
    }

    fn take_suggestion(&mut self, id: &SuggestionId) -> Result<QueuedSuggestion> {
        let index = self.suggestion_index(id)?;
        let queued = self.suggestions.remove(index);
        self.unread = self.unread.min(self.suggestions.len() as u32);
        Ok(queued)
    }
}

/// Authoritative in-memory backend
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    delivery: Arc<dyn DeliveryChannel>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Backend whose deliveries always succeed
    pub fn new() -> Self {
        Self::with_delivery(Arc::new(LogChannel))
    }

    pub fn with_delivery(delivery: Arc<dyn DeliveryChannel>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            delivery,
        }
    }

    /// Put an approval straight into the queue
    pub async fn seed_approval(&self, draft: NewApproval) -> Result<Approval> {
        let approval = self.state.write().await.enqueue(draft)?;
        info!(approval_id = %approval.id, "Approval enqueued");
        Ok(approval)
    }

    /// Offer a suggestion; `draft` is the approval it becomes on accept.
    /// Returns `Ok(false)` when a standing mute suppresses it and a
    /// validation error when the draft could never be enqueued.
    pub async fn propose_suggestion(
        &self,
        suggestion: Suggestion,
        draft: NewApproval,
    ) -> Result<bool> {
        draft.validate()?;

        let mut state = self.state.write().await;
        if state.is_muted(&suggestion) {
            debug!(
                suggestion_id = %suggestion.id,
                suggestion_type = %suggestion.suggestion_type,
                "Suggestion suppressed by mute"
            );
            return Ok(false);
        }

        state.suggestions.retain(|q| q.suggestion.id != suggestion.id);
        state.suggestions.push(QueuedSuggestion { suggestion, draft });
        state.unread += 1;
        Ok(true)
    }

    /// Append a run reported from elsewhere to a workflow's log
    pub async fn record_execution(&self, execution: Execution) -> Result<()> {
        execution.validate()?;
        let mut state = self.state.write().await;
        state.workflow(&execution.workflow_id)?;
        state.executions.push(execution);
        Ok(())
    }

    /// Run every active workflow whose trigger matches `event`
    pub async fn dispatch(&self, event: &InboundEvent) -> Result<Vec<Execution>> {
        let mut state = self.state.write().await;

        let outcomes: Vec<RunOutcome> = state
            .workflows
            .iter()
            .filter(|w| w.is_active())
            .filter(|w| w.trigger.as_ref().map_or(false, |t| trigger_matches(t, event)))
            .map(|w| run_workflow(w, event))
            .collect();

        let mut executions = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            for draft in outcome.approvals {
                let approval = state.enqueue(draft)?;
                debug!(
                    approval_id = %approval.id,
                    workflow_id = %outcome.execution.workflow_id,
                    "Reply drafted for approval"
                );
            }
            info!(
                workflow_id = %outcome.execution.workflow_id,
                execution_id = %outcome.execution.id,
                status = %outcome.execution.status,
                "Workflow executed"
            );
            state.executions.push(outcome.execution.clone());
            executions.push(outcome.execution);
        }

        Ok(executions)
    }
}

#[async_trait]
impl AutomationBackend for InMemoryBackend {
    async fn create_workflow(&self, definition: NewWorkflow) -> Result<Workflow> {
        let workflow = Workflow::from_definition(WorkflowId::generate(), definition, Utc::now())?;
        self.state.write().await.workflows.push(workflow.clone());

        info!(workflow_id = %workflow.id, status = %workflow.status, "Workflow created");
        Ok(workflow)
    }

    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        self.state.read().await.workflow(id).cloned()
    }

    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        let state = self.state.read().await;
        Ok(state
            .workflows
            .iter()
            .filter(|w| status.map_or(true, |s| w.status == s))
            .cloned()
            .collect())
    }

    async fn update_workflow(&self, id: &WorkflowId, patch: WorkflowPatch) -> Result<Workflow> {
        let mut state = self.state.write().await;
        let workflow = state.workflow_mut(id)?;
        workflow.apply_patch(patch, Utc::now())?;

        info!(workflow_id = %id, "Workflow updated");
        Ok(workflow.clone())
    }

    async fn activate_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        let mut state = self.state.write().await;
        let workflow = state.workflow_mut(id)?;
        if workflow.activate(Utc::now())? {
            info!(workflow_id = %id, "Workflow activated");
        } else {
            debug!(workflow_id = %id, "Workflow already active");
        }
        Ok(workflow.clone())
    }

    async fn pause_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        let mut state = self.state.write().await;
        let workflow = state.workflow_mut(id)?;
        workflow.pause(Utc::now())?;

        info!(workflow_id = %id, "Workflow paused");
        Ok(workflow.clone())
    }

    async fn list_executions(&self, workflow_id: &WorkflowId) -> Result<Vec<Execution>> {
        let state = self.state.read().await;
        state.workflow(workflow_id)?;
        Ok(state
            .executions
            .iter()
            .filter(|e| &e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        let state = self.state.read().await;
        Ok(state
            .approvals
            .iter()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect())
    }

    async fn get_approval(&self, id: &ApprovalId) -> Result<Approval> {
        self.state.read().await.approval(id).cloned()
    }

    async fn update_approval(&self, id: &ApprovalId, patch: ApprovalPatch) -> Result<Approval> {
        let mut state = self.state.write().await;
        let approval = state.approval_mut(id)?;
        approval.apply_patch(patch, Utc::now())?;

        info!(approval_id = %id, status = %approval.status, "Approval updated");
        Ok(approval.clone())
    }

    async fn send_approval(&self, id: &ApprovalId) -> Result<Approval> {
        // The write lock is held across delivery so a reply goes out once.
        let mut state = self.state.write().await;
        let approval = state.approval_mut(id)?;
        approval.ensure_pending()?;

        if let Err(err) = self.delivery.deliver(approval).await {
            warn!(approval_id = %id, error = %err, "Delivery failed, approval stays pending");
            return Err(match err {
                AutomationError::Delivery(_) => err,
                other => AutomationError::Delivery(other.to_string()),
            });
        }

        approval.mark_sent(Utc::now())?;
        info!(approval_id = %id, "Approval sent");
        Ok(approval.clone())
    }

    async fn reject_approval(&self, id: &ApprovalId, reason: Option<String>) -> Result<Approval> {
        let mut state = self.state.write().await;
        let approval = state.approval_mut(id)?;
        approval.reject(reason, Utc::now())?;

        info!(
            approval_id = %id,
            reason = approval.rejected_reason.as_deref().unwrap_or(""),
            "Approval rejected"
        );
        Ok(approval.clone())
    }

    async fn suggestion_summary(&self) -> Result<SuggestionSummary> {
        let state = self.state.read().await;
        Ok(SuggestionSummary::build(
            state.suggestions.iter().map(|q| &q.suggestion),
            &state.mutes,
            state.unread,
            state.prefs,
        ))
    }

    async fn accept_suggestion(&self, id: &SuggestionId) -> Result<()> {
        let mut state = self.state.write().await;
        // Enqueue before removing so a failure leaves the queue and the
        // unread count untouched
        let index = state.suggestion_index(id)?;
        let draft = state.suggestions[index].draft.clone();
        let approval = state.enqueue(draft)?;
        state.take_suggestion(id)?;

        info!(suggestion_id = %id, approval_id = %approval.id, "Suggestion accepted");
        Ok(())
    }

    async fn reject_suggestion(&self, id: &SuggestionId) -> Result<()> {
        self.state.write().await.take_suggestion(id)?;
        info!(suggestion_id = %id, "Suggestion rejected");
        Ok(())
    }

    async fn mute_suggestions(&self, rule: MuteRule) -> Result<()> {
        info!(
            suggestion_type = %rule.suggestion_type,
            rule_id = rule.rule_id.as_ref().map(|r| r.as_str()).unwrap_or("*"),
            "Suggestions muted"
        );
        self.state.write().await.mutes.insert(rule);
        Ok(())
    }

    async fn notification_prefs(&self) -> Result<NotificationPrefs> {
        Ok(self.state.read().await.prefs)
    }

    async fn set_notification_prefs(&self, prefs: NotificationPrefs) -> Result<NotificationPrefs> {
        self.state.write().await.prefs = prefs;
        info!(weekly_digest_opt_in = prefs.weekly_digest_opt_in, "Notification preferences saved");
        Ok(prefs)
    }
}
