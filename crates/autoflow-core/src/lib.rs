//! Core domain for Autoflow workflow automation
//!
//! Workflows (trigger + conditions + actions), the approval queue they feed,
//! the append-only execution log and quick-win suggestions, together with the
//! lifecycle rules each of them obeys.

pub mod approval;
pub mod config;
pub mod error;
pub mod execution;
pub mod suggestion;
pub mod traits;
pub mod types;
pub mod workflow;

pub use approval::{Approval, ApprovalPatch, ApprovalStatus, NewApproval};
pub use self::config::*;
pub use error::*;
pub use execution::{Execution, ExecutionStats, ExecutionStatus};
pub use suggestion::{MuteRule, NotificationPrefs, Suggestion, SuggestionBadge, SuggestionSummary};
pub use traits::AutomationBackend;
pub use types::*;
pub use workflow::{
    Action, AssignConfig, Condition, ConditionOperator, NewWorkflow, NotifyConfig, TagConfig,
    TemplateReplyConfig, Trigger, TriggerKind, Workflow, WorkflowPatch, WorkflowStatus,
};
