//! The approval queue: human review of drafted replies

use autoflow_core::{Approval, ApprovalId, ApprovalPatch, ApprovalStatus, Result};
use autoflow_infra::Idempotency;
use tracing::{info, instrument};

use crate::context::ServiceContext;
use crate::notify::Notice;

/// List, edit and decide pending approvals
///
/// Decisions are commands: `send`, `reject` and patches are never retried
/// automatically, so an ambiguous failure has to be resolved by re-reading
/// the approval.
#[derive(Clone)]
pub struct ApprovalQueue {
    ctx: ServiceContext,
}

impl ApprovalQueue {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Approvals awaiting a decision
    pub async fn pending(&self) -> Result<Vec<Approval>> {
        self.list(Some(ApprovalStatus::Pending)).await
    }

    /// `None` lists every approval regardless of status
    #[instrument(skip(self))]
    pub async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        self.ctx
            .call("list_approvals", Idempotency::Idempotent, || {
                self.ctx.backend().list_approvals(status)
            })
            .await
    }

    #[instrument(skip(self), fields(approval_id = %id))]
    pub async fn get(&self, id: &ApprovalId) -> Result<Approval> {
        self.ctx
            .call("get_approval", Idempotency::Idempotent, || {
                self.ctx.backend().get_approval(id)
            })
            .await
    }

    #[instrument(skip(self, patch), fields(approval_id = %id))]
    pub async fn update(&self, id: &ApprovalId, patch: ApprovalPatch) -> Result<Approval> {
        if let Err(err) = patch.validate() {
            return self.ctx.reject_locally("update_approval", err);
        }

        let approval = self
            .ctx
            .call("update_approval", Idempotency::Command, || {
                self.ctx.backend().update_approval(id, patch.clone())
            })
            .await?;

        let message = match approval.status {
            ApprovalStatus::Saved => "Approval saved for later",
            ApprovalStatus::Rejected => "Approval rejected",
            _ => "Approval updated",
        };
        self.ctx.notify(Notice::success(message));
        Ok(approval)
    }

    /// Replace the response text while pending
    pub async fn edit(&self, id: &ApprovalId, text: impl Into<String>) -> Result<Approval> {
        self.update(id, ApprovalPatch::edit(text)).await
    }

    /// `pending -> saved`
    pub async fn save(&self, id: &ApprovalId) -> Result<Approval> {
        self.update(id, ApprovalPatch::save()).await
    }

    /// Deliver the effective response. On delivery failure the approval
    /// stays pending and may be sent again.
    #[instrument(skip(self), fields(approval_id = %id))]
    pub async fn send(&self, id: &ApprovalId) -> Result<Approval> {
        let approval = self
            .ctx
            .call("send_approval", Idempotency::Command, || {
                self.ctx.backend().send_approval(id)
            })
            .await?;

        info!(approval_id = %id, platform = %approval.platform, "Reply sent");
        self.ctx
            .notify(Notice::success(format!("Reply sent on {}", approval.platform)));
        Ok(approval)
    }

    /// `pending -> rejected`, keeping `reason` verbatim when given
    #[instrument(skip(self), fields(approval_id = %id))]
    pub async fn reject(&self, id: &ApprovalId, reason: Option<String>) -> Result<Approval> {
        let approval = self
            .ctx
            .call("reject_approval", Idempotency::Command, || {
                self.ctx.backend().reject_approval(id, reason.clone())
            })
            .await?;

        self.ctx.notify(Notice::success("Approval rejected"));
        Ok(approval)
    }
}
