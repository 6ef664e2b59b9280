//! Approval queue entries and their one-way lifecycle
//!
//! ```text
//!             ┌──────[pending]──────┐
//!             │     │      │        │
//!           edit   send   reject   save
//!                  (sent) (rejected)(saved)
//! ```
//!
//! `sent`, `rejected` and `saved` are terminal. A terminal record is never
//! mutated again and nothing re-enters `pending`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};
use crate::types::{ApprovalId, InteractionType, Platform, WorkflowId};

/// Status of an approval entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a human decision
    Pending,
    /// Response delivered to the platform
    Sent,
    /// Dismissed, optionally with a reason
    Rejected,
    /// Kept as a draft; distinct from rejection
    Saved,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Sent => "sent",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Saved => "saved",
        }
    }
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        ApprovalStatus::Pending
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "sent" => Ok(ApprovalStatus::Sent),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "saved" => Ok(ApprovalStatus::Saved),
            _ => Err(format!("Unknown approval status: {}", s)),
        }
    }
}

/// A proposed response awaiting human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    /// Originating workflow; ad-hoc suggestions have none
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    pub platform: Platform,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub user_message: String,
    pub proposed_response: String,
    #[serde(default)]
    pub edited_response: Option<String>,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub rejected_reason: Option<String>,
    /// Update sequence number, bumped on every mutation
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Approval {
    pub fn from_draft(id: ApprovalId, draft: NewApproval, now: DateTime<Utc>) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id,
            workflow_id: draft.workflow_id,
            platform: draft.platform,
            interaction_type: draft.interaction_type,
            author: draft.author,
            link: draft.link,
            user_message: draft.user_message,
            proposed_response: draft.proposed_response,
            edited_response: None,
            status: ApprovalStatus::Pending,
            rejected_reason: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// The text that will be delivered: the human edit when present
    pub fn effective_response(&self) -> &str {
        self.edited_response
            .as_deref()
            .unwrap_or(&self.proposed_response)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub fn ensure_pending(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AutomationError::invalid_state(format!(
                "approval {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn check_revision(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.revision => {
                Err(AutomationError::conflict(expected, self.revision))
            }
            _ => Ok(()),
        }
    }

    /// Apply a human edit/decision. The record is unchanged on error.
    pub fn apply_patch(&mut self, patch: ApprovalPatch, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.check_revision(patch.expected_revision)?;
        patch.validate()?;

        if let Some(text) = patch.edited_response {
            self.edited_response = Some(text);
        }
        match patch.status {
            Some(ApprovalStatus::Rejected) => {
                self.status = ApprovalStatus::Rejected;
                self.rejected_reason = patch.rejected_reason;
            }
            Some(ApprovalStatus::Saved) => self.status = ApprovalStatus::Saved,
            _ => {}
        }
        self.touch(now);
        Ok(())
    }

    /// Record a successful delivery (`pending -> sent`)
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = ApprovalStatus::Sent;
        self.touch(now);
        Ok(())
    }

    /// `pending -> rejected`; an absent reason stays unset
    pub fn reject(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = ApprovalStatus::Rejected;
        self.rejected_reason = reason;
        self.touch(now);
        Ok(())
    }

    /// `pending -> saved`
    pub fn save(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = ApprovalStatus::Saved;
        self.touch(now);
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.revision += 1;
        self.updated_at = now;
    }
}

/// Content of a new approval, produced by a workflow run or an accepted suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApproval {
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    pub platform: Platform,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub user_message: String,
    pub proposed_response: String,
}

impl NewApproval {
    pub fn new(
        platform: Platform,
        interaction_type: InteractionType,
        user_message: impl Into<String>,
        proposed_response: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: None,
            platform,
            interaction_type,
            author: None,
            link: None,
            user_message: user_message.into(),
            proposed_response: proposed_response.into(),
        }
    }

    pub fn with_workflow(mut self, workflow_id: WorkflowId) -> Self {
        self.workflow_id = Some(workflow_id);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.proposed_response.trim().is_empty() {
            return Err(AutomationError::validation("proposed response must not be empty"));
        }
        Ok(())
    }
}

/// Partial update of a pending approval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revision: Option<u64>,
}

impl ApprovalPatch {
    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            edited_response: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn save() -> Self {
        Self {
            status: Some(ApprovalStatus::Saved),
            ..Default::default()
        }
    }

    pub fn reject(reason: Option<String>) -> Self {
        Self {
            status: Some(ApprovalStatus::Rejected),
            rejected_reason: reason,
            ..Default::default()
        }
    }

    pub fn at_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.edited_response.is_none() && self.status.is_none() {
            return Err(AutomationError::validation("approval patch has no changes"));
        }
        if let Some(text) = &self.edited_response {
            if text.trim().is_empty() {
                return Err(AutomationError::validation("edited response must not be empty"));
            }
        }
        if self.status == Some(ApprovalStatus::Sent) {
            return Err(AutomationError::validation(
                "approvals are marked sent only by delivering them",
            ));
        }
        if self.rejected_reason.is_some() && self.status != Some(ApprovalStatus::Rejected) {
            return Err(AutomationError::validation(
                "rejected_reason is only allowed together with status rejected",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Approval {
        Approval::from_draft(
            ApprovalId::new("ap-1"),
            NewApproval::new(
                Platform::Instagram,
                InteractionType::Dm,
                "Where is my order?",
                "Hi! Let me check that for you.",
            )
            .with_author("@fan"),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_edited_response_overrides_proposed() {
        let mut approval = pending();
        assert_eq!(approval.effective_response(), "Hi! Let me check that for you.");

        approval
            .apply_patch(ApprovalPatch::edit("Checking now, one sec!"), Utc::now())
            .unwrap();
        assert_eq!(approval.effective_response(), "Checking now, one sec!");
        assert!(approval.is_pending());
        assert_eq!(approval.revision, 1);
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let finishers: [fn(&mut Approval) -> Result<()>; 3] = [
            |a| a.mark_sent(Utc::now()),
            |a| a.reject(Some("off-brand".into()), Utc::now()),
            |a| a.save(Utc::now()),
        ];
        for finish in finishers {
            let mut approval = pending();
            finish(&mut approval).unwrap();
            let frozen = approval.clone();

            assert!(matches!(approval.mark_sent(Utc::now()), Err(AutomationError::InvalidState(_))));
            assert!(matches!(approval.reject(None, Utc::now()), Err(AutomationError::InvalidState(_))));
            assert!(matches!(
                approval.apply_patch(ApprovalPatch::edit("late edit"), Utc::now()),
                Err(AutomationError::InvalidState(_))
            ));
            assert_eq!(approval, frozen);
        }
    }

    #[test]
    fn test_reject_reason_round_trip() {
        let mut with_reason = pending();
        with_reason.reject(Some("tone".into()), Utc::now()).unwrap();
        assert_eq!(with_reason.rejected_reason.as_deref(), Some("tone"));

        let mut without = pending();
        without.reject(None, Utc::now()).unwrap();
        assert_eq!(without.status, ApprovalStatus::Rejected);
        assert!(without.rejected_reason.is_none());
    }

    #[test]
    fn test_patch_rules() {
        let mut approval = pending();
        let sent = ApprovalPatch {
            status: Some(ApprovalStatus::Sent),
            ..Default::default()
        };
        assert!(matches!(approval.apply_patch(sent, Utc::now()), Err(AutomationError::Validation(_))));

        let stray_reason = ApprovalPatch {
            edited_response: Some("x".into()),
            rejected_reason: Some("why".into()),
            ..Default::default()
        };
        assert!(approval.apply_patch(stray_reason, Utc::now()).is_err());
        assert!(approval.apply_patch(ApprovalPatch::default(), Utc::now()).is_err());
        assert!(approval.is_pending());
        assert_eq!(approval.revision, 0);

        approval.apply_patch(ApprovalPatch::save(), Utc::now()).unwrap();
        assert_eq!(approval.status, ApprovalStatus::Saved);
        assert!(approval.rejected_reason.is_none());
    }

    #[test]
    fn test_revision_conflict() {
        let mut approval = pending();
        approval
            .apply_patch(ApprovalPatch::edit("first").at_revision(0), Utc::now())
            .unwrap();

        let err = approval
            .apply_patch(ApprovalPatch::edit("stale").at_revision(0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AutomationError::Conflict { expected: Some(0), actual: Some(1) }));
        assert_eq!(approval.effective_response(), "first");
    }

    #[test]
    fn test_wire_format_defaults() {
        let json = serde_json::json!({
            "id": 17,
            "platform": "youtube",
            "interaction_type": "comment",
            "user_message": "love this",
            "proposed_response": "thank you!",
            "status": "pending",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        });
        let approval: Approval = serde_json::from_value(json).unwrap();
        assert_eq!(approval.id.as_str(), "17");
        assert!(approval.workflow_id.is_none());
        assert_eq!(approval.revision, 0);
    }
}
