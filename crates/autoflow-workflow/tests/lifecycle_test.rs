//! End-to-end lifecycle tests for the client-side services, run against the
//! in-process backend.

use async_trait::async_trait;
use autoflow_core::{
    Action, Approval, ApprovalId, ApprovalPatch, ApprovalStatus, AutomationBackend,
    AutomationError, Execution, ExecutionStatus, InteractionType, MuteRule, NewApproval,
    NewWorkflow, NotificationPrefs, Platform, Result, RuleId, Suggestion, SuggestionId,
    SuggestionSummary, Trigger, TriggerKind, Workflow, WorkflowId, WorkflowPatch, WorkflowStatus,
};
use autoflow_infra::{
    CallPolicy, InMemoryBackend, InboundEvent, RecordingChannel, RetryPolicy, TimeoutPolicy,
};
use autoflow_workflow::{AutomationServices, MemoryNotifier, NoticeLevel, ServiceContext};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// ==================== Harness ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    /// Fail without touching the backend
    Before,
    /// Apply the change, then lose the response
    After,
}

#[derive(Default)]
struct Faults {
    transition: Option<(Fault, u32)>,
    prefs: u32,
}

/// Delegates to an `InMemoryBackend`, injecting transient failures
struct FlakyBackend {
    inner: InMemoryBackend,
    faults: Mutex<Faults>,
}

impl FlakyBackend {
    fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    fn fail_transitions(&self, fault: Fault, times: u32) {
        self.faults.lock().transition = Some((fault, times));
    }

    fn fail_prefs(&self, times: u32) {
        self.faults.lock().prefs = times;
    }

    fn next_transition_fault(&self) -> Option<Fault> {
        let mut faults = self.faults.lock();
        match faults.transition {
            Some((fault, n)) if n > 0 => {
                faults.transition = Some((fault, n - 1));
                Some(fault)
            }
            _ => None,
        }
    }

    async fn transition<F>(&self, apply: F) -> Result<Workflow>
    where
        F: std::future::Future<Output = Result<Workflow>>,
    {
        match self.next_transition_fault() {
            Some(Fault::Before) => Err(AutomationError::Transient("connection reset".into())),
            Some(Fault::After) => {
                let _ = apply.await;
                Err(AutomationError::Transient("response lost".into()))
            }
            None => apply.await,
        }
    }
}

#[async_trait]
impl AutomationBackend for FlakyBackend {
    async fn create_workflow(&self, definition: NewWorkflow) -> Result<Workflow> {
        self.inner.create_workflow(definition).await
    }

    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        self.inner.get_workflow(id).await
    }

    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        self.inner.list_workflows(status).await
    }

    async fn update_workflow(&self, id: &WorkflowId, patch: WorkflowPatch) -> Result<Workflow> {
        self.inner.update_workflow(id, patch).await
    }

    async fn activate_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        self.transition(self.inner.activate_workflow(id)).await
    }

    async fn pause_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        self.transition(self.inner.pause_workflow(id)).await
    }

    async fn list_executions(&self, workflow_id: &WorkflowId) -> Result<Vec<Execution>> {
        self.inner.list_executions(workflow_id).await
    }

    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        self.inner.list_approvals(status).await
    }

    async fn get_approval(&self, id: &ApprovalId) -> Result<Approval> {
        self.inner.get_approval(id).await
    }

    async fn update_approval(&self, id: &ApprovalId, patch: ApprovalPatch) -> Result<Approval> {
        self.inner.update_approval(id, patch).await
    }

    async fn send_approval(&self, id: &ApprovalId) -> Result<Approval> {
        self.inner.send_approval(id).await
    }

    async fn reject_approval(&self, id: &ApprovalId, reason: Option<String>) -> Result<Approval> {
        self.inner.reject_approval(id, reason).await
    }

    async fn suggestion_summary(&self) -> Result<SuggestionSummary> {
        self.inner.suggestion_summary().await
    }

    async fn accept_suggestion(&self, id: &SuggestionId) -> Result<()> {
        self.inner.accept_suggestion(id).await
    }

    async fn reject_suggestion(&self, id: &SuggestionId) -> Result<()> {
        self.inner.reject_suggestion(id).await
    }

    async fn mute_suggestions(&self, rule: MuteRule) -> Result<()> {
        self.inner.mute_suggestions(rule).await
    }

    async fn notification_prefs(&self) -> Result<NotificationPrefs> {
        self.inner.notification_prefs().await
    }

    async fn set_notification_prefs(&self, prefs: NotificationPrefs) -> Result<NotificationPrefs> {
        {
            let mut faults = self.faults.lock();
            if faults.prefs > 0 {
                faults.prefs -= 1;
                return Err(AutomationError::Transient("gateway timeout".into()));
            }
        }
        self.inner.set_notification_prefs(prefs).await
    }
}

struct Harness {
    engine: InMemoryBackend,
    flaky: Arc<FlakyBackend>,
    channel: Arc<RecordingChannel>,
    notifier: Arc<MemoryNotifier>,
    services: AutomationServices,
}

fn harness() -> Harness {
    let channel = Arc::new(RecordingChannel::new());
    let engine = InMemoryBackend::with_delivery(channel.clone());
    let flaky = Arc::new(FlakyBackend::new(engine.clone()));
    let notifier = Arc::new(MemoryNotifier::new());

    let ctx = ServiceContext::new(flaky.clone())
        .with_notifier(notifier.clone())
        .with_policy(CallPolicy::new(
            RetryPolicy::fixed(2, Duration::from_millis(1)),
            TimeoutPolicy::new(Duration::from_secs(2)),
        ));

    Harness {
        engine,
        flaky,
        channel,
        notifier,
        services: AutomationServices::new(ctx),
    }
}

fn runnable(name: &str) -> NewWorkflow {
    NewWorkflow::new(name)
        .with_trigger(Trigger::new(TriggerKind::Sentiment, "negative"))
        .with_action(Action::tag("urgent").unwrap())
}

fn reply_draft(text: &str) -> NewApproval {
    NewApproval::new(Platform::Instagram, InteractionType::Dm, "Where is my order?", text)
        .with_author("@fan")
        .with_link("https://instagram.com/p/abc")
}

fn without_status_and_timestamp(workflow: &Workflow) -> serde_json::Value {
    let mut value = serde_json::to_value(workflow).unwrap();
    let map = value.as_object_mut().unwrap();
    map.remove("status");
    map.remove("updated_at");
    value
}

// ==================== Workflow Lifecycle ====================

#[tokio::test]
async fn test_activate_requires_trigger_and_actions() {
    let h = harness();
    let store = &h.services.workflows;

    let cases = [
        NewWorkflow::new("empty"),
        NewWorkflow::new("no actions").with_trigger(Trigger::new(TriggerKind::Keyword, "refund")),
        NewWorkflow::new("no trigger").with_action(Action::assign("support").unwrap()),
    ];
    for definition in cases {
        let wf = store.create(definition).await.unwrap();
        let err = store.activate(&wf.id).await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidState(_)));
        assert_eq!(store.get(&wf.id).await.unwrap().status, WorkflowStatus::Draft);
    }

    let wf = store.create(runnable("complete")).await.unwrap();
    assert!(store.activate(&wf.id).await.unwrap().is_active());
}

#[tokio::test]
async fn test_auto_tag_negative_dms_scenario() {
    let h = harness();
    let store = &h.services.workflows;

    let wf = store
        .create(NewWorkflow::new("Auto-tag negative DMs").with_status(WorkflowStatus::Draft))
        .await
        .unwrap();
    assert_eq!(wf.status, WorkflowStatus::Draft);

    assert!(matches!(
        store.activate(&wf.id).await,
        Err(AutomationError::InvalidState(_))
    ));
    assert!(h.notifier.errors().iter().any(|n| n.message.contains("activate")));

    store
        .update(
            &wf.id,
            WorkflowPatch::new()
                .trigger(Trigger::new(TriggerKind::Sentiment, "negative"))
                .actions(vec![Action::tag("urgent").unwrap()]),
        )
        .await
        .unwrap();

    let active = store.activate(&wf.id).await.unwrap();
    assert_eq!(active.status, WorkflowStatus::Active);
}

#[tokio::test]
async fn test_create_validates_before_calling_backend() {
    let h = harness();

    let err = h.services.workflows.create(NewWorkflow::new("   ")).await.unwrap_err();
    assert!(matches!(err, AutomationError::Validation(_)));
    assert!(h.engine.list_workflows(None).await.unwrap().is_empty());
    assert_eq!(h.notifier.last().map(|n| n.level), Some(NoticeLevel::Error));
}

#[tokio::test]
async fn test_update_cannot_strip_active_workflow() {
    let h = harness();
    let store = &h.services.workflows;
    let wf = store.create(runnable("Escalate")).await.unwrap();
    store.activate(&wf.id).await.unwrap();

    let err = store
        .update(&wf.id, WorkflowPatch::new().actions(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::InvalidState(_)));
    assert_eq!(store.get(&wf.id).await.unwrap().actions.len(), 1);
}

#[tokio::test]
async fn test_toggle_round_trip_preserves_definition() {
    let h = harness();
    let wf = h.services.workflows.create(runnable("Escalate")).await.unwrap();
    h.services.workflows.activate(&wf.id).await.unwrap();

    let board = &h.services.board;
    board.refresh(None).await.unwrap();
    let before = board.find(&wf.id).unwrap();

    let paused = board.toggle(&wf.id).await.unwrap();
    assert_eq!(paused.status, WorkflowStatus::Paused);
    let resumed = board.toggle(&wf.id).await.unwrap();
    assert_eq!(resumed.status, WorkflowStatus::Active);

    assert_eq!(
        without_status_and_timestamp(&before),
        without_status_and_timestamp(&resumed)
    );
    assert_eq!(board.find(&wf.id).unwrap(), resumed);
}

#[tokio::test]
async fn test_toggle_rolls_back_when_change_never_landed() {
    let h = harness();
    let wf = h.services.workflows.create(runnable("Escalate")).await.unwrap();
    h.services.workflows.activate(&wf.id).await.unwrap();
    let board = &h.services.board;
    board.refresh(None).await.unwrap();

    h.flaky.fail_transitions(Fault::Before, 3);
    let err = board.toggle(&wf.id).await.unwrap_err();
    assert!(err.is_retryable());

    assert_eq!(board.find(&wf.id).unwrap().status, WorkflowStatus::Active);
    assert_eq!(h.engine.get_workflow(&wf.id).await.unwrap().status, WorkflowStatus::Active);
}

#[tokio::test]
async fn test_toggle_compensates_when_change_landed() {
    let h = harness();
    let wf = h.services.workflows.create(runnable("Escalate")).await.unwrap();
    h.services.workflows.activate(&wf.id).await.unwrap();
    h.services.workflows.pause(&wf.id).await.unwrap();
    let board = &h.services.board;
    board.refresh(None).await.unwrap();

    // Every activate attempt applies but loses its response; the inverse
    // pause then goes through.
    h.flaky.fail_transitions(Fault::After, 3);
    h.notifier.drain();
    assert!(board.toggle(&wf.id).await.is_err());

    let server = h.engine.get_workflow(&wf.id).await.unwrap();
    assert_eq!(server.status, WorkflowStatus::Paused);
    assert_eq!(board.find(&wf.id).unwrap().status, WorkflowStatus::Paused);

    // The inverse command is silent; only the failure and the outcome show
    let notices = h.notifier.notices();
    assert!(notices.iter().all(|n| n.level != NoticeLevel::Success));
    assert_eq!(notices.last().map(|n| n.level), Some(NoticeLevel::Info));
    assert!(notices.last().unwrap().message.ends_with("paused"));
}

#[tokio::test]
async fn test_pause_with_lost_response_is_not_reported_as_refused() {
    let h = harness();
    let wf = h.services.workflows.create(runnable("Escalate")).await.unwrap();
    h.services.workflows.activate(&wf.id).await.unwrap();
    let board = &h.services.board;
    board.refresh(None).await.unwrap();

    // The first pause lands but its response is lost; the retry then sees
    // a workflow that is no longer active.
    h.flaky.fail_transitions(Fault::After, 1);
    h.notifier.drain();
    let paused = board.toggle(&wf.id).await.unwrap();
    assert_eq!(paused.status, WorkflowStatus::Paused);

    let server = h.engine.get_workflow(&wf.id).await.unwrap();
    assert_eq!(server.status, WorkflowStatus::Paused);
    assert_eq!(board.find(&wf.id).unwrap(), server);
    assert!(h.notifier.errors().is_empty());
}

#[tokio::test]
async fn test_refused_toggle_shows_server_record() {
    let h = harness();
    let wf = h.services.workflows.create(runnable("Escalate")).await.unwrap();
    h.services.workflows.activate(&wf.id).await.unwrap();
    let board = &h.services.board;
    board.refresh(None).await.unwrap();

    // Paused elsewhere; the board still shows it active
    h.engine.pause_workflow(&wf.id).await.unwrap();

    let err = board.toggle(&wf.id).await.unwrap_err();
    assert!(matches!(err, AutomationError::InvalidState(_)));

    let server = h.engine.get_workflow(&wf.id).await.unwrap();
    assert_eq!(board.find(&wf.id).unwrap(), server);
}

#[tokio::test]
async fn test_transient_failures_are_retried_for_transitions() {
    let h = harness();
    let wf = h.services.workflows.create(runnable("Escalate")).await.unwrap();

    h.flaky.fail_transitions(Fault::Before, 2);
    let active = h.services.workflows.activate(&wf.id).await.unwrap();
    assert!(active.is_active());
}

// ==================== Approval Queue ====================

#[tokio::test]
async fn test_terminal_approvals_are_immutable() {
    let h = harness();
    let queue = &h.services.approvals;

    for finish in ["send", "reject", "save"] {
        let approval = h.engine.seed_approval(reply_draft("On it!")).await.unwrap();
        match finish {
            "send" => queue.send(&approval.id).await.map(|_| ()),
            "reject" => queue.reject(&approval.id, Some("tone".into())).await.map(|_| ()),
            _ => queue.save(&approval.id).await.map(|_| ()),
        }
        .unwrap();

        let terminal = queue.get(&approval.id).await.unwrap();
        assert!(terminal.status.is_terminal());

        assert!(matches!(
            queue.edit(&approval.id, "changed").await,
            Err(AutomationError::InvalidState(_))
        ));
        assert!(matches!(
            queue.send(&approval.id).await,
            Err(AutomationError::InvalidState(_))
        ));
        assert!(matches!(
            queue.reject(&approval.id, None).await,
            Err(AutomationError::InvalidState(_))
        ));
        assert_eq!(queue.get(&approval.id).await.unwrap(), terminal);
    }
}

#[tokio::test]
async fn test_reject_reason_round_trip() {
    let h = harness();
    let queue = &h.services.approvals;

    let with_reason = h.engine.seed_approval(reply_draft("a")).await.unwrap();
    queue
        .reject(&with_reason.id, Some("  off brand  ".into()))
        .await
        .unwrap();
    assert_eq!(
        queue.get(&with_reason.id).await.unwrap().rejected_reason.as_deref(),
        Some("  off brand  ")
    );

    let without = h.engine.seed_approval(reply_draft("b")).await.unwrap();
    queue.reject(&without.id, None).await.unwrap();
    let fetched = queue.get(&without.id).await.unwrap();
    assert_eq!(fetched.status, ApprovalStatus::Rejected);
    assert!(fetched.rejected_reason.is_none());
}

#[tokio::test]
async fn test_send_first_pending_removes_it_from_queue() {
    let h = harness();
    let queue = &h.services.approvals;
    for text in ["one", "two", "three"] {
        h.engine.seed_approval(reply_draft(text)).await.unwrap();
    }

    let pending = queue.pending().await.unwrap();
    assert_eq!(pending.len(), 3);

    let first = &pending[0];
    let sent = queue.send(&first.id).await.unwrap();
    assert_eq!(sent.status, ApprovalStatus::Sent);

    let remaining = queue.pending().await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|a| a.id != first.id));
    assert_eq!(h.channel.delivered().len(), 1);
}

#[tokio::test]
async fn test_delivery_failure_keeps_approval_pending() {
    let h = harness();
    let queue = &h.services.approvals;
    let approval = h.engine.seed_approval(reply_draft("On it!")).await.unwrap();

    h.channel.fail_with("instagram unavailable");
    let err = queue.send(&approval.id).await.unwrap_err();
    assert!(matches!(err, AutomationError::Delivery(_)));
    assert!(queue.get(&approval.id).await.unwrap().is_pending());

    let notice = h.notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("still pending"));

    h.channel.recover();
    assert_eq!(queue.send(&approval.id).await.unwrap().status, ApprovalStatus::Sent);
}

#[tokio::test]
async fn test_patch_rules_are_enforced_locally() {
    let h = harness();
    let queue = &h.services.approvals;
    let approval = h.engine.seed_approval(reply_draft("On it!")).await.unwrap();

    let deliver_via_patch = ApprovalPatch {
        status: Some(ApprovalStatus::Sent),
        ..Default::default()
    };
    assert!(matches!(
        queue.update(&approval.id, deliver_via_patch).await,
        Err(AutomationError::Validation(_))
    ));

    let stray_reason = ApprovalPatch {
        rejected_reason: Some("why".into()),
        ..Default::default()
    };
    assert!(matches!(
        queue.update(&approval.id, stray_reason).await,
        Err(AutomationError::Validation(_))
    ));

    let edited = queue.edit(&approval.id, "Checking now!").await.unwrap();
    assert_eq!(edited.effective_response(), "Checking now!");
    assert_eq!(edited.proposed_response, "On it!");
}

// ==================== Suggestions ====================

#[tokio::test]
async fn test_accepting_suggestion_adds_one_pending_approval() {
    let h = harness();
    let suggestion = Suggestion::new(
        SuggestionId::new("42"),
        "faq_reply",
        "Answer shipping questions",
        "Most DMs this week asked about shipping",
    )
    .with_rule(RuleId::new("shipping"))
    .with_savings(45);
    assert!(h
        .engine
        .propose_suggestion(suggestion, reply_draft("Ships in 2 days"))
        .await
        .unwrap());

    let before = h.services.approvals.pending().await.unwrap().len();
    h.services.suggestions.accept(&SuggestionId::new("42")).await.unwrap();
    let after = h.services.approvals.pending().await.unwrap().len();

    assert_eq!(after, before + 1);
    assert_eq!(h.notifier.last().unwrap().level, NoticeLevel::Success);
}

#[tokio::test]
async fn test_mute_suppresses_future_quick_wins() {
    let h = harness();
    let center = &h.services.suggestions;
    let faq = |id: &str| {
        Suggestion::new(SuggestionId::new(id), "faq_reply", "FAQ", "FAQ")
            .with_rule(RuleId::new("shipping"))
    };

    h.engine.propose_suggestion(faq("1"), reply_draft("a")).await.unwrap();
    assert!(center.summary().await.unwrap().has_type("faq_reply"));

    center
        .mute("faq_reply", Some(RuleId::new("shipping")))
        .await
        .unwrap();
    assert!(!center.summary().await.unwrap().has_type("faq_reply"));

    assert!(!h.engine.propose_suggestion(faq("2"), reply_draft("b")).await.unwrap());
    let summary = center.summary().await.unwrap();
    assert!(!summary.has_type("faq_reply"));
    assert!(summary.badges.get("shipping").is_none());

    assert!(matches!(
        center.mute("  ", None).await,
        Err(AutomationError::Validation(_))
    ));
}

#[tokio::test]
async fn test_weekly_digest_rolls_back_on_failure() {
    let h = harness();
    let center = &h.services.suggestions;
    assert!(!center.prefs().await.unwrap().weekly_digest_opt_in);

    // Three attempts, all failing
    h.flaky.fail_prefs(3);
    assert!(center.set_weekly_digest(true).await.is_err());
    assert_eq!(
        center.cached_prefs(),
        Some(NotificationPrefs { weekly_digest_opt_in: false })
    );

    h.flaky.fail_prefs(1);
    let saved = center.set_weekly_digest(true).await.unwrap();
    assert!(saved.weekly_digest_opt_in);
    assert_eq!(center.cached_prefs(), Some(saved));
    assert!(h.engine.notification_prefs().await.unwrap().weekly_digest_opt_in);
}

// ==================== Executions ====================

#[tokio::test]
async fn test_execution_log_after_dispatch() {
    let h = harness();
    let store = &h.services.workflows;
    let wf = store
        .create(
            NewWorkflow::new("Reply to order questions")
                .with_trigger(Trigger::new(TriggerKind::Keyword, "order"))
                .with_action(Action::template_reply("Hi {{author}}, let me check.").unwrap()),
        )
        .await
        .unwrap();
    store.activate(&wf.id).await.unwrap();

    let known = InboundEvent::new(Platform::Instagram, InteractionType::Dm, "order?").with_author("@fan");
    let anonymous = InboundEvent::new(Platform::Youtube, InteractionType::Comment, "order?");
    h.engine.dispatch(&known).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.engine.dispatch(&anonymous).await.unwrap();

    let recent = h.services.executions.recent(&wf.id, None).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].status, ExecutionStatus::Failed);
    assert_eq!(recent[1].status, ExecutionStatus::Completed);

    let stats = h.services.executions.stats(&wf.id).await.unwrap();
    assert_eq!((stats.completed, stats.failed), (1, 1));
    assert!(stats.needs_attention);

    assert_eq!(h.services.executions.failures(&wf.id).await.unwrap().len(), 1);

    let pending = h.services.approvals.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].workflow_id.as_ref(), Some(&wf.id));
}
