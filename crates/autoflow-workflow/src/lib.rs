//! Client-side services for Autoflow
//!
//! This crate sits between a front end and an [`AutomationBackend`]:
//! - [`WorkflowStore`] and [`WorkflowBoard`]: definitions, transitions and
//!   the optimistic active/paused toggle with compensation
//! - [`ApprovalQueue`]: edit, send, reject and save drafted replies
//! - [`SuggestionCenter`]: quick wins, mutes and the weekly digest opt-in
//! - [`ExecutionLog`]: recent runs and rollups
//!
//! Every call runs under a timeout, idempotent calls retry transient
//! failures, and every failure is reported through a [`Notifier`].

pub mod approvals;
pub mod context;
pub mod executions;
pub mod notify;
pub mod store;
pub mod suggestions;

pub use approvals::ApprovalQueue;
pub use context::ServiceContext;
pub use executions::ExecutionLog;
pub use notify::{MemoryNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use store::{WorkflowBoard, WorkflowStore};
pub use suggestions::SuggestionCenter;

pub use autoflow_core::{AutomationBackend, AutomationError, Result};

/// Every service, wired to one backend
pub struct AutomationServices {
    pub workflows: WorkflowStore,
    pub board: WorkflowBoard,
    pub approvals: ApprovalQueue,
    pub suggestions: SuggestionCenter,
    pub executions: ExecutionLog,
}

impl AutomationServices {
    pub fn new(ctx: ServiceContext) -> Self {
        let workflows = WorkflowStore::new(ctx.clone());
        Self {
            board: WorkflowBoard::new(workflows.clone()),
            executions: ExecutionLog::new(workflows.clone()),
            approvals: ApprovalQueue::new(ctx.clone()),
            suggestions: SuggestionCenter::new(ctx),
            workflows,
        }
    }
}
