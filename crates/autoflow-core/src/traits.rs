//! The backend contract consumed by every client-side service
//!
//! The backend owns the workflow, approval and execution stores and is the
//! authority on every transition. Mutating calls return the post-mutation
//! record, which callers use in place of anything they computed locally.

use async_trait::async_trait;

use crate::approval::{Approval, ApprovalPatch, ApprovalStatus};
use crate::error::Result;
use crate::execution::Execution;
use crate::suggestion::{MuteRule, NotificationPrefs, SuggestionSummary};
use crate::types::{ApprovalId, SuggestionId, WorkflowId};
use crate::workflow::{NewWorkflow, Workflow, WorkflowPatch, WorkflowStatus};

#[async_trait]
pub trait AutomationBackend: Send + Sync {
    // Workflow definitions

    async fn create_workflow(&self, definition: NewWorkflow) -> Result<Workflow>;

    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow>;

    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>>;

    async fn update_workflow(&self, id: &WorkflowId, patch: WorkflowPatch) -> Result<Workflow>;

    async fn activate_workflow(&self, id: &WorkflowId) -> Result<Workflow>;

    async fn pause_workflow(&self, id: &WorkflowId) -> Result<Workflow>;

    async fn list_executions(&self, workflow_id: &WorkflowId) -> Result<Vec<Execution>>;

    // Approval queue

    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>>;

    async fn get_approval(&self, id: &ApprovalId) -> Result<Approval>;

    async fn update_approval(&self, id: &ApprovalId, patch: ApprovalPatch) -> Result<Approval>;

    async fn send_approval(&self, id: &ApprovalId) -> Result<Approval>;

    async fn reject_approval(&self, id: &ApprovalId, reason: Option<String>) -> Result<Approval>;

    // Suggestions

    async fn suggestion_summary(&self) -> Result<SuggestionSummary>;

    async fn accept_suggestion(&self, id: &SuggestionId) -> Result<()>;

    async fn reject_suggestion(&self, id: &SuggestionId) -> Result<()>;

    async fn mute_suggestions(&self, rule: MuteRule) -> Result<()>;

    async fn notification_prefs(&self) -> Result<NotificationPrefs>;

    async fn set_notification_prefs(&self, prefs: NotificationPrefs) -> Result<NotificationPrefs>;
}
