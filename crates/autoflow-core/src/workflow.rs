//! Workflow definitions and their activation lifecycle
//!
//! A workflow is a trigger, an ordered list of conditions and an ordered list
//! of typed actions. Only `draft -> active`, `active -> paused` and
//! `paused -> active` are legal transitions, and an active workflow always has
//! a trigger and at least one action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AutomationError, Result};
use crate::types::WorkflowId;

/// Lifecycle status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Paused,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(WorkflowStatus::Draft),
            "active" => Ok(WorkflowStatus::Active),
            "paused" => Ok(WorkflowStatus::Paused),
            _ => Err(format!("Unknown workflow status: {}", s)),
        }
    }
}

/// What kind of inbound event starts a workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerKind {
    /// Message contains the value (case-insensitive)
    Keyword,
    /// Detected sentiment equals the value
    Sentiment,
    /// Interaction arrived on the given platform
    Platform,
    /// Interaction is of the given type (dm, comment, mention)
    InteractionType,
    /// Kinds this client does not know about; never matched locally
    Unknown,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Keyword => "keyword",
            TriggerKind::Sentiment => "sentiment",
            TriggerKind::Platform => "platform",
            TriggerKind::InteractionType => "interaction_type",
            TriggerKind::Unknown => "unknown",
        }
    }
}

impl From<String> for TriggerKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "keyword" => TriggerKind::Keyword,
            "sentiment" => TriggerKind::Sentiment,
            "platform" => TriggerKind::Platform,
            "interaction_type" => TriggerKind::InteractionType,
            _ => TriggerKind::Unknown,
        }
    }
}

impl From<TriggerKind> for String {
    fn from(kind: TriggerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow trigger: a kind plus the value it matches on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    pub value: String,
}

impl Trigger {
    pub fn new(kind: TriggerKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind == TriggerKind::Unknown {
            return Err(AutomationError::validation("trigger type is not supported"));
        }
        if self.value.trim().is_empty() {
            return Err(AutomationError::validation("trigger value must not be empty"));
        }
        Ok(())
    }
}

impl std::str::FromStr for Trigger {
    type Err = String;

    /// Parses `type=value`, e.g. `sentiment=negative`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once('=')
            .ok_or_else(|| format!("Expected TYPE=VALUE, got: {}", s))?;
        let kind = TriggerKind::from(kind.trim().to_lowercase());
        if kind == TriggerKind::Unknown {
            return Err(format!("Unknown trigger type: {}", s));
        }
        Ok(Trigger::new(kind, value.trim()))
    }
}

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Exists,
}

/// A field/operator/value triple evaluated against an inbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(AutomationError::validation("condition field must not be empty"));
        }
        match self.operator {
            ConditionOperator::GreaterThan | ConditionOperator::LessThan
                if self.value.as_f64().is_none() =>
            {
                Err(AutomationError::validation(format!(
                    "condition on '{}' needs a numeric value",
                    self.field
                )))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate against the resolved field value (`None` when the field is absent)
    pub fn evaluate(&self, actual: Option<&Value>) -> bool {
        let actual = actual.filter(|v| !v.is_null());
        match self.operator {
            ConditionOperator::Exists => actual.is_some(),
            ConditionOperator::Equals => actual.map_or(false, |v| loosely_equal(v, &self.value)),
            ConditionOperator::NotEquals => {
                !actual.map_or(false, |v| loosely_equal(v, &self.value))
            }
            ConditionOperator::Contains => actual.map_or(false, |v| contains(v, &self.value)),
            ConditionOperator::NotContains => !actual.map_or(false, |v| contains(v, &self.value)),
            ConditionOperator::GreaterThan => compare(actual, &self.value)
                .map_or(false, |ord| ord == std::cmp::Ordering::Greater),
            ConditionOperator::LessThan => compare(actual, &self.value)
                .map_or(false, |ord| ord == std::cmp::Ordering::Less),
        }
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn contains(actual: &Value, needle: &Value) -> bool {
    match (actual, needle) {
        (Value::String(hay), Value::String(n)) => {
            hay.to_lowercase().contains(&n.to_lowercase())
        }
        (Value::Array(items), _) => items.iter().any(|item| loosely_equal(item, needle)),
        _ => false,
    }
}

fn compare(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let a = actual?.as_f64()?;
    let b = expected.as_f64()?;
    a.partial_cmp(&b)
}

/// Adds a tag to the interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    pub tag: String,
}

/// Assigns the interaction to a team member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignConfig {
    pub assignee: String,
}

/// Sends a notification on a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Drafts a reply from a template; the draft lands in the approval queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateReplyConfig {
    pub template: String,
}

/// A typed workflow action. On the wire: `{"type": "...", "config": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum Action {
    Tag(TagConfig),
    Assign(AssignConfig),
    Notify(NotifyConfig),
    TemplateReply(TemplateReplyConfig),
}

impl Action {
    pub fn tag(tag: impl Into<String>) -> Result<Self> {
        let action = Action::Tag(TagConfig { tag: tag.into() });
        action.validate()?;
        Ok(action)
    }

    pub fn assign(assignee: impl Into<String>) -> Result<Self> {
        let action = Action::Assign(AssignConfig {
            assignee: assignee.into(),
        });
        action.validate()?;
        Ok(action)
    }

    pub fn notify(channel: impl Into<String>, message: Option<String>) -> Result<Self> {
        let action = Action::Notify(NotifyConfig {
            channel: channel.into(),
            message,
        });
        action.validate()?;
        Ok(action)
    }

    pub fn template_reply(template: impl Into<String>) -> Result<Self> {
        let action = Action::TemplateReply(TemplateReplyConfig {
            template: template.into(),
        });
        action.validate()?;
        Ok(action)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Tag(_) => "tag",
            Action::Assign(_) => "assign",
            Action::Notify(_) => "notify",
            Action::TemplateReply(_) => "template_reply",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (field, value) = match self {
            Action::Tag(c) => ("tag", &c.tag),
            Action::Assign(c) => ("assignee", &c.assignee),
            Action::Notify(c) => ("channel", &c.channel),
            Action::TemplateReply(c) => ("template", &c.template),
        };
        if value.trim().is_empty() {
            return Err(AutomationError::validation(format!(
                "{} action requires a non-empty {}",
                self.kind(),
                field
            )));
        }
        Ok(())
    }
}

/// A persisted workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Materialize a creation request; the caller assigns identity and time
    pub fn from_definition(id: WorkflowId, definition: NewWorkflow, now: DateTime<Utc>) -> Result<Self> {
        definition.validate()?;

        let workflow = Self {
            id,
            name: definition.name.trim().to_string(),
            status: WorkflowStatus::Draft,
            description: definition.description,
            trigger: definition.trigger,
            conditions: definition.conditions,
            actions: definition.actions,
            created_at: now,
            updated_at: now,
        };

        match definition.status.unwrap_or(WorkflowStatus::Draft) {
            WorkflowStatus::Draft => Ok(workflow),
            WorkflowStatus::Active => {
                workflow.ensure_activatable()?;
                Ok(Self {
                    status: WorkflowStatus::Active,
                    ..workflow
                })
            }
            WorkflowStatus::Paused => Err(AutomationError::invalid_state(
                "a workflow cannot be created paused",
            )),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// Check the activation invariant: a trigger and at least one action
    pub fn ensure_activatable(&self) -> Result<()> {
        match (&self.trigger, self.actions.is_empty()) {
            (None, true) => Err(AutomationError::invalid_state(format!(
                "workflow {} has no trigger and no actions",
                self.id
            ))),
            (None, false) => Err(AutomationError::invalid_state(format!(
                "workflow {} has no trigger",
                self.id
            ))),
            (Some(_), true) => Err(AutomationError::invalid_state(format!(
                "workflow {} has no actions",
                self.id
            ))),
            (Some(_), false) => Ok(()),
        }
    }

    /// Transition to `active`. Returns `false` when already active (no-op).
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.is_active() {
            return Ok(false);
        }
        self.ensure_activatable()?;
        self.status = WorkflowStatus::Active;
        self.updated_at = now;
        Ok(true)
    }

    /// Transition `active -> paused`
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_active() {
            return Err(AutomationError::invalid_state(format!(
                "workflow {} is {}, only active workflows can be paused",
                self.id, self.status
            )));
        }
        self.status = WorkflowStatus::Paused;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a definition patch. Status is untouched; the record is left
    /// unchanged when the patch is rejected.
    pub fn apply_patch(&mut self, patch: WorkflowPatch, now: DateTime<Utc>) -> Result<()> {
        patch.validate()?;

        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            next.description = Some(description);
        }
        if let Some(trigger) = patch.trigger {
            next.trigger = Some(trigger);
        }
        if let Some(conditions) = patch.conditions {
            next.conditions = conditions;
        }
        if let Some(actions) = patch.actions {
            next.actions = actions;
        }
        if next.is_active() {
            next.ensure_activatable()?;
        }

        next.updated_at = now;
        *self = next;
        Ok(())
    }
}

/// Creation request for a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl NewWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AutomationError::validation("workflow name is required"));
        }
        validate_parts(self.trigger.as_ref(), &self.conditions, &self.actions)
    }
}

/// Partial update of a workflow definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
}

impl WorkflowPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AutomationError::validation("workflow name must not be empty"));
            }
        }
        validate_parts(
            self.trigger.as_ref(),
            self.conditions.as_deref().unwrap_or_default(),
            self.actions.as_deref().unwrap_or_default(),
        )
    }
}

fn validate_parts(trigger: Option<&Trigger>, conditions: &[Condition], actions: &[Action]) -> Result<()> {
    if let Some(trigger) = trigger {
        trigger.validate()?;
    }
    conditions.iter().try_for_each(Condition::validate)?;
    actions.iter().try_for_each(Action::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> Workflow {
        Workflow::from_definition(
            WorkflowId::new("wf-1"),
            NewWorkflow::new("Auto-tag negative DMs").with_status(WorkflowStatus::Draft),
            Utc::now(),
        )
        .unwrap()
    }

    fn sentiment_trigger() -> Trigger {
        Trigger::new(TriggerKind::Sentiment, "negative")
    }

    #[test]
    fn test_create_requires_name() {
        let result = Workflow::from_definition(WorkflowId::new("x"), NewWorkflow::new("  "), Utc::now());
        assert!(matches!(result, Err(AutomationError::Validation(_))));
    }

    #[test]
    fn test_created_in_draft_by_default() {
        let wf = draft();
        assert_eq!(wf.status, WorkflowStatus::Draft);
        assert!(wf.trigger.is_none());
        assert!(wf.actions.is_empty());
    }

    #[test]
    fn test_create_active_requires_invariant() {
        let result = Workflow::from_definition(
            WorkflowId::new("x"),
            NewWorkflow::new("Active").with_status(WorkflowStatus::Active),
            Utc::now(),
        );
        assert!(matches!(result, Err(AutomationError::InvalidState(_))));

        let wf = Workflow::from_definition(
            WorkflowId::new("x"),
            NewWorkflow::new("Active")
                .with_status(WorkflowStatus::Active)
                .with_trigger(sentiment_trigger())
                .with_action(Action::tag("urgent").unwrap()),
            Utc::now(),
        )
        .unwrap();
        assert!(wf.is_active());
    }

    #[test]
    fn test_activate_without_trigger_fails_and_keeps_status() {
        let mut wf = draft();
        let before = wf.clone();
        let err = wf.activate(Utc::now()).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidState(_)));
        assert_eq!(wf, before);

        wf.trigger = Some(sentiment_trigger());
        assert!(wf.activate(Utc::now()).is_err());
        assert_eq!(wf.status, WorkflowStatus::Draft);
    }

    #[test]
    fn test_activate_pause_cycle() {
        let mut wf = draft();
        wf.apply_patch(
            WorkflowPatch::new()
                .trigger(sentiment_trigger())
                .actions(vec![Action::tag("urgent").unwrap()]),
            Utc::now(),
        )
        .unwrap();

        assert!(wf.activate(Utc::now()).unwrap());
        assert!(!wf.activate(Utc::now()).unwrap(), "second activation is a no-op");
        wf.pause(Utc::now()).unwrap();
        assert_eq!(wf.status, WorkflowStatus::Paused);
        assert!(wf.pause(Utc::now()).is_err());
        wf.activate(Utc::now()).unwrap();
        assert!(wf.is_active());
    }

    #[test]
    fn test_pause_draft_is_invalid() {
        let mut wf = draft();
        assert!(matches!(
            wf.pause(Utc::now()),
            Err(AutomationError::InvalidState(_))
        ));
    }

    #[test]
    fn test_patch_cannot_strip_active_workflow() {
        let mut wf = draft();
        wf.trigger = Some(sentiment_trigger());
        wf.actions = vec![Action::tag("urgent").unwrap()];
        wf.activate(Utc::now()).unwrap();

        let before = wf.clone();
        let err = wf
            .apply_patch(WorkflowPatch::new().actions(vec![]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AutomationError::InvalidState(_)));
        assert_eq!(wf, before);
    }

    #[test]
    fn test_patch_rejects_empty_name() {
        let mut wf = draft();
        let err = wf
            .apply_patch(WorkflowPatch::new().name(""), Utc::now())
            .unwrap_err();
        assert!(matches!(err, AutomationError::Validation(_)));
    }

    #[test]
    fn test_action_wire_format() {
        let action = Action::tag("urgent").unwrap();
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "tag", "config": {"tag": "urgent"}})
        );

        let parsed: Action = serde_json::from_value(json!({
            "type": "template_reply",
            "config": {"template": "Thanks {{author}}!"}
        }))
        .unwrap();
        assert_eq!(parsed.kind(), "template_reply");

        let bad = serde_json::from_value::<Action>(json!({"type": "assign", "config": {"tag": "x"}}));
        assert!(bad.is_err());
        assert!(Action::notify("", None).is_err());
    }

    #[test]
    fn test_trigger_parsing() {
        let trigger: Trigger = "sentiment=negative".parse().unwrap();
        assert_eq!(trigger, sentiment_trigger());
        assert!("bogus=1".parse::<Trigger>().is_err());
        assert!("no-separator".parse::<Trigger>().is_err());

        let unknown: Trigger = serde_json::from_value(json!({"type": "schedule", "value": "daily"})).unwrap();
        assert_eq!(unknown.kind, TriggerKind::Unknown);
    }

    #[test]
    fn test_condition_evaluation() {
        let contains = Condition::new("message", ConditionOperator::Contains, json!("refund"));
        assert!(contains.evaluate(Some(&json!("I want a REFUND now"))));
        assert!(!contains.evaluate(None));

        let gt = Condition::new("followers", ConditionOperator::GreaterThan, json!(1000));
        assert!(gt.evaluate(Some(&json!(5000))));
        assert!(!gt.evaluate(Some(&json!("lots"))));

        let ne = Condition::new("author", ConditionOperator::NotEquals, json!("spam_bot"));
        assert!(ne.evaluate(None));
        assert!(!ne.evaluate(Some(&json!("Spam_Bot"))));

        let exists = Condition::new("link", ConditionOperator::Exists, Value::Null);
        assert!(!exists.evaluate(Some(&Value::Null)));

        let bad = Condition::new("followers", ConditionOperator::LessThan, json!("many"));
        assert!(bad.validate().is_err());
    }
}
