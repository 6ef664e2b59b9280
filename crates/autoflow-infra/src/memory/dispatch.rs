//! Running workflows against inbound interactions
//!
//! A workflow fires when its trigger matches the event. Conditions then gate
//! the run: unmet conditions produce a `skipped` execution. Otherwise actions
//! run in order and each `template_reply` yields a draft approval.

use autoflow_core::{
    Action, Execution, InteractionType, NewApproval, Platform, Trigger, TriggerKind, Workflow,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// `{{placeholder}}` tokens in reply templates
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"));

/// An interaction arriving from a social platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub platform: Platform,
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub message: String,
    /// Classifier output, e.g. `negative`
    #[serde(default)]
    pub sentiment: Option<String>,
    /// Anything else the platform attached, addressable as `fields.<path>`
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl InboundEvent {
    pub fn new(
        platform: Platform,
        interaction_type: InteractionType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            interaction_type,
            author: None,
            link: None,
            message: message.into(),
            sentiment: None,
            fields: Map::new(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = Some(sentiment.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// JSON view used for condition fields and as the execution context
    pub fn context(&self) -> Value {
        json!({
            "platform": self.platform.as_str(),
            "interaction_type": self.interaction_type.as_str(),
            "author": self.author,
            "link": self.link,
            "message": self.message,
            "sentiment": self.sentiment,
            "fields": self.fields,
        })
    }
}

/// Whether `trigger` fires for `event`. Unknown kinds never fire.
pub fn trigger_matches(trigger: &Trigger, event: &InboundEvent) -> bool {
    let value = trigger.value.trim();
    match trigger.kind {
        TriggerKind::Keyword => event
            .message
            .to_lowercase()
            .contains(&value.to_lowercase()),
        TriggerKind::Sentiment => event
            .sentiment
            .as_deref()
            .map_or(false, |s| s.eq_ignore_ascii_case(value)),
        TriggerKind::Platform => value
            .parse::<Platform>()
            .map_or(false, |p| p == event.platform),
        TriggerKind::InteractionType => value
            .parse::<InteractionType>()
            .map_or(false, |t| t == event.interaction_type),
        TriggerKind::Unknown => false,
    }
}

/// Get value at JSON path (dot notation, numeric segments index arrays)
pub fn get_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(index) if current.is_array() => current.get(index)?,
            _ => current.get(part)?,
        };
    }
    Some(current)
}

/// Render a reply template. Fails on unknown placeholders and on
/// `{{author}}` when the interaction has no author.
pub fn render_template(template: &str, event: &InboundEvent) -> Result<String, String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let replacement = match name.as_str() {
            "author" => event
                .author
                .as_deref()
                .ok_or_else(|| "template uses {{author}} but the interaction has no author".to_string())?,
            "message" => event.message.as_str(),
            "platform" => event.platform.as_str(),
            "interaction_type" => event.interaction_type.as_str(),
            other => return Err(format!("unknown template placeholder {{{{{}}}}}", other)),
        };
        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(replacement);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

/// Execution record plus the approvals a run enqueues
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub execution: Execution,
    pub approvals: Vec<NewApproval>,
}

/// Run one workflow whose trigger already matched
pub fn run_workflow(workflow: &Workflow, event: &InboundEvent) -> RunOutcome {
    let context = event.context();

    if let Some(unmet) = workflow
        .conditions
        .iter()
        .find(|c| !c.evaluate(get_json_path(&context, &c.field)))
    {
        let result = json!({
            "reason": "conditions not met",
            "condition": unmet.field,
        });
        return RunOutcome {
            execution: Execution::skipped(workflow.id.clone(), context, result),
            approvals: Vec::new(),
        };
    }

    let mut applied = Vec::with_capacity(workflow.actions.len());
    let mut approvals = Vec::new();

    for action in &workflow.actions {
        let step = match action {
            Action::Tag(config) => Ok(json!({"type": "tag", "tag": config.tag})),
            Action::Assign(config) => Ok(json!({"type": "assign", "assignee": config.assignee})),
            Action::Notify(config) => config
                .message
                .as_deref()
                .map(|m| render_template(m, event))
                .transpose()
                .map(|message| {
                    json!({"type": "notify", "channel": config.channel, "message": message})
                }),
            Action::TemplateReply(config) => {
                render_template(&config.template, event).and_then(|reply| {
                    if reply.trim().is_empty() {
                        return Err("rendered reply is empty".to_string());
                    }
                    approvals.push(draft_reply(workflow, event, reply.clone()));
                    Ok(json!({"type": "template_reply", "reply": reply}))
                })
            }
        };

        match step {
            Ok(entry) => applied.push(entry),
            Err(error) => {
                return RunOutcome {
                    execution: Execution::failed(
                        workflow.id.clone(),
                        context,
                        format!("{} action failed: {}", action.kind(), error),
                    ),
                    approvals: Vec::new(),
                };
            }
        }
    }

    let result = json!({
        "actions": applied,
        "approvals_enqueued": approvals.len(),
    });
    RunOutcome {
        execution: Execution::completed(workflow.id.clone(), context, result),
        approvals,
    }
}

fn draft_reply(workflow: &Workflow, event: &InboundEvent, reply: String) -> NewApproval {
    let mut draft = NewApproval::new(
        event.platform,
        event.interaction_type,
        event.message.clone(),
        reply,
    )
    .with_workflow(workflow.id.clone());
    draft.author = event.author.clone();
    draft.link = event.link.clone();
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::{Condition, ConditionOperator, ExecutionStatus, NewWorkflow, WorkflowId};
    use chrono::Utc;

    fn event() -> InboundEvent {
        InboundEvent::new(Platform::Instagram, InteractionType::Dm, "Where is my ORDER?")
            .with_author("@fan")
            .with_sentiment("negative")
            .with_field("followers", json!(1200))
    }

    fn workflow(definition: NewWorkflow) -> Workflow {
        Workflow::from_definition(WorkflowId::new("wf-1"), definition, Utc::now()).unwrap()
    }

    #[test]
    fn test_trigger_kinds() {
        let e = event();
        assert!(trigger_matches(&Trigger::new(TriggerKind::Keyword, "order"), &e));
        assert!(!trigger_matches(&Trigger::new(TriggerKind::Keyword, "refund"), &e));
        assert!(trigger_matches(&Trigger::new(TriggerKind::Sentiment, "Negative"), &e));
        assert!(trigger_matches(&Trigger::new(TriggerKind::Platform, "instagram"), &e));
        assert!(!trigger_matches(&Trigger::new(TriggerKind::Platform, "tiktok"), &e));
        assert!(trigger_matches(&Trigger::new(TriggerKind::InteractionType, "dm"), &e));
        assert!(!trigger_matches(&Trigger::new(TriggerKind::Unknown, "anything"), &e));
    }

    #[test]
    fn test_json_path() {
        let value = json!({"fields": {"tags": ["vip", "repeat"], "followers": 10}});
        assert_eq!(get_json_path(&value, "fields.followers"), Some(&json!(10)));
        assert_eq!(get_json_path(&value, "fields.tags.1"), Some(&json!("repeat")));
        assert_eq!(get_json_path(&value, "fields.missing"), None);
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template("Hi {{ author }}, thanks for the {{interaction_type}}!", &event());
        assert_eq!(rendered.unwrap(), "Hi @fan, thanks for the dm!");

        let err = render_template("Hi {{nickname}}", &event()).unwrap_err();
        assert!(err.contains("nickname"));

        let anonymous = InboundEvent::new(Platform::Youtube, InteractionType::Comment, "nice");
        assert!(render_template("Thanks {{author}}", &anonymous).is_err());
        assert_eq!(render_template("No placeholders", &anonymous).unwrap(), "No placeholders");
    }

    #[test]
    fn test_unmet_condition_skips() {
        let wf = workflow(
            NewWorkflow::new("Big accounts only")
                .with_trigger(Trigger::new(TriggerKind::Sentiment, "negative"))
                .with_condition(Condition::new(
                    "fields.followers",
                    ConditionOperator::GreaterThan,
                    json!(10_000),
                ))
                .with_action(Action::tag("vip").unwrap()),
        );

        let outcome = run_workflow(&wf, &event());
        assert_eq!(outcome.execution.status, ExecutionStatus::Skipped);
        assert!(outcome.execution.error.is_none());
        assert!(outcome.approvals.is_empty());
    }

    #[test]
    fn test_template_reply_enqueues_draft() {
        let wf = workflow(
            NewWorkflow::new("Order help")
                .with_trigger(Trigger::new(TriggerKind::Keyword, "order"))
                .with_condition(Condition::new("platform", ConditionOperator::Equals, json!("instagram")))
                .with_action(Action::tag("orders").unwrap())
                .with_action(Action::template_reply("Hi {{author}}, checking now.").unwrap()),
        );

        let outcome = run_workflow(&wf, &event());
        assert_eq!(outcome.execution.status, ExecutionStatus::Completed);
        assert_eq!(outcome.execution.result["actions"].as_array().unwrap().len(), 2);
        assert_eq!(outcome.approvals.len(), 1);

        let draft = &outcome.approvals[0];
        assert_eq!(draft.workflow_id, Some(WorkflowId::new("wf-1")));
        assert_eq!(draft.proposed_response, "Hi @fan, checking now.");
        assert_eq!(draft.author.as_deref(), Some("@fan"));
    }

    #[test]
    fn test_render_failure_fails_execution() {
        let wf = workflow(
            NewWorkflow::new("Broken")
                .with_trigger(Trigger::new(TriggerKind::Keyword, "order"))
                .with_action(Action::template_reply("Hi {{first_name}}").unwrap()),
        );

        let outcome = run_workflow(&wf, &event());
        assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
        assert!(outcome.execution.error.as_deref().unwrap().contains("template_reply"));
        assert!(outcome.approvals.is_empty());
    }
}
