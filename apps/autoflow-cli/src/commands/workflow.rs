//! Workflow management commands

use crate::commands::Session;
use crate::output::{self, OutputFormat};
use crate::{DefinitionArgs, EventArgs, GlobalArgs, WorkflowCommands};
use anyhow::{bail, Context, Result};
use autoflow_core::{
    Action, Execution, ExecutionStats, NewWorkflow, Workflow, WorkflowId, WorkflowPatch,
    WorkflowStatus,
};
use autoflow_infra::memory::{run_workflow, trigger_matches};
use autoflow_infra::InboundEvent;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tabled::{Table, Tabled};

pub async fn run(global: &GlobalArgs, cmd: WorkflowCommands) -> Result<()> {
    let session = Session::resolve(global)?;
    let format = session.format;

    match cmd {
        WorkflowCommands::List { status } => {
            let workflows = session.services()?.workflows.list(status).await?;
            output::emit(&workflows, format, |w| print_workflows(w))
        }
        WorkflowCommands::Show { id } => {
            let workflow = session.services()?.workflows.get(&WorkflowId::new(id)).await?;
            output::emit(&workflow, format, print_workflow)
        }
        WorkflowCommands::Create { definition, active } => {
            let mut new_workflow = definition.into_new_workflow()?;
            if active {
                new_workflow.status = Some(WorkflowStatus::Active);
            }
            let workflow = session.services()?.workflows.create(new_workflow).await?;
            output::emit(&workflow, format, |w| output::key_value("ID", &w.id))
        }
        WorkflowCommands::Update { id, definition } => {
            let patch = definition.into_patch()?;
            let workflow = session
                .services()?
                .workflows
                .update(&WorkflowId::new(id), patch)
                .await?;
            output::emit(&workflow, format, |_| {})
        }
        WorkflowCommands::Activate { id } => {
            let workflow = session.services()?.workflows.activate(&WorkflowId::new(id)).await?;
            output::emit(&workflow, format, |_| {})
        }
        WorkflowCommands::Pause { id } => {
            let workflow = session.services()?.workflows.pause(&WorkflowId::new(id)).await?;
            output::emit(&workflow, format, |_| {})
        }
        WorkflowCommands::Toggle { id } => {
            let services = session.services()?;
            services.board.refresh(None).await?;
            let workflow = services.board.toggle(&WorkflowId::new(id)).await?;
            output::emit(&workflow, format, |_| {})
        }
        WorkflowCommands::Executions {
            id,
            limit,
            failed,
            stats,
        } => {
            let services = session.services()?;
            let id = WorkflowId::new(id);
            if stats {
                let stats = services.executions.stats(&id).await?;
                return output::emit(&stats, format, print_stats);
            }

            let executions = if failed {
                let mut failures = services.executions.failures(&id).await?;
                failures.truncate(limit);
                failures
            } else {
                services.executions.recent(&id, Some(limit)).await?
            };
            output::emit(&executions, format, |e| print_executions(e))
        }
        WorkflowCommands::Validate { file } => validate_workflow(&file),
        WorkflowCommands::Test { file, event } => test_workflow(&file, event, format),
    }
}

impl DefinitionArgs {
    fn actions(&self) -> Result<Vec<Action>> {
        let mut actions = Vec::new();
        for tag in &self.tags {
            actions.push(Action::tag(tag.as_str())?);
        }
        for assignee in &self.assignees {
            actions.push(Action::assign(assignee.as_str())?);
        }
        for channel in &self.channels {
            actions.push(Action::notify(channel.as_str(), None)?);
        }
        if let Some(template) = &self.reply {
            actions.push(Action::template_reply(template.as_str())?);
        }
        Ok(actions)
    }

    /// A creation request: the file, if any, with flags layered on top
    fn into_new_workflow(self) -> Result<NewWorkflow> {
        let extra_actions = self.actions()?;
        let mut definition = match &self.file {
            Some(path) => load_definition(path)?,
            None => NewWorkflow::new(
                self.name
                    .clone()
                    .context("a workflow needs --name or --file")?,
            ),
        };

        if let Some(name) = self.name {
            definition.name = name;
        }
        if let Some(description) = self.description {
            definition.description = Some(description);
        }
        if let Some(trigger) = self.trigger {
            definition.trigger = Some(trigger);
        }
        definition.actions.extend(extra_actions);
        Ok(definition)
    }

    /// A patch: a file replaces the whole definition, flags replace single fields
    fn into_patch(self) -> Result<WorkflowPatch> {
        let actions = self.actions()?;
        let mut patch = match &self.file {
            Some(path) => {
                let definition = load_definition(path)?;
                WorkflowPatch {
                    name: Some(definition.name),
                    description: definition.description,
                    trigger: definition.trigger,
                    conditions: Some(definition.conditions),
                    actions: Some(definition.actions),
                }
            }
            None => WorkflowPatch::new(),
        };

        if let Some(name) = self.name {
            patch = patch.name(name);
        }
        if let Some(description) = self.description {
            patch = patch.description(description);
        }
        if let Some(trigger) = self.trigger {
            patch = patch.trigger(trigger);
        }
        if !actions.is_empty() {
            patch = patch.actions(actions);
        }

        if patch.is_empty() {
            bail!("nothing to update: pass --file or at least one field flag");
        }
        Ok(patch)
    }
}

/// Read a definition from JSON or YAML, chosen by extension
fn load_definition(path: &Path) -> Result<NewWorkflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let definition = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(definition)
}

fn validate_workflow(file: &Path) -> Result<()> {
    let definition = load_definition(file)?;

    if let Err(e) = definition.validate() {
        output::error(&format!("Workflow validation failed: {}", e));
        bail!("Validation failed");
    }

    let preview = Workflow::from_definition(WorkflowId::new("preview"), definition, Utc::now());
    match preview.and_then(|w| w.ensure_activatable()) {
        Ok(()) => output::success("Workflow definition is valid and can be activated"),
        Err(e) => output::warning(&format!(
            "Workflow definition is valid but cannot be activated yet: {}",
            e
        )),
    }
    Ok(())
}

/// What a local test run produced
#[derive(Serialize)]
struct TestRun {
    matched: bool,
    execution: Option<Execution>,
    drafted_replies: Vec<String>,
}

fn test_workflow(file: &Path, event: EventArgs, format: OutputFormat) -> Result<()> {
    let definition = load_definition(file)?;
    let workflow = Workflow::from_definition(WorkflowId::new("local-test"), definition, Utc::now())?;
    let event = event.into_event()?;

    let matched = workflow
        .trigger
        .as_ref()
        .map_or(false, |t| trigger_matches(t, &event));
    let outcome = matched.then(|| run_workflow(&workflow, &event));

    let report = TestRun {
        matched,
        drafted_replies: outcome
            .as_ref()
            .map(|o| o.approvals.iter().map(|a| a.proposed_response.clone()).collect())
            .unwrap_or_default(),
        execution: outcome.map(|o| o.execution),
    };

    output::emit(&report, format, |report| {
        let Some(execution) = &report.execution else {
            output::info("Trigger does not match this event; nothing would run");
            return;
        };
        output::key_value("Status", output::status_label(&execution.status.to_string()));
        if let Some(error) = &execution.error {
            output::key_value("Error", error);
        } else {
            output::key_value("Result", &execution.result);
        }
        for reply in &report.drafted_replies {
            output::key_value("Drafted reply", reply);
        }
    })
}

impl EventArgs {
    fn into_event(self) -> Result<InboundEvent> {
        let mut event = InboundEvent::new(self.platform, self.interaction_type, self.message);
        if let Some(author) = self.author {
            event = event.with_author(author);
        }
        if let Some(sentiment) = self.sentiment {
            event = event.with_sentiment(sentiment);
        }
        for field in self.fields {
            let (key, value) = field
                .split_once('=')
                .with_context(|| format!("expected KEY=VALUE, got '{}'", field))?;
            // Numbers and booleans keep their JSON type
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            event = event.with_field(key, value);
        }
        Ok(event)
    }
}

fn describe_trigger(workflow: &Workflow) -> String {
    workflow
        .trigger
        .as_ref()
        .map(|t| format!("{}={}", t.kind, t.value))
        .unwrap_or_else(|| "-".to_string())
}

fn print_workflows(workflows: &[Workflow]) {
    if workflows.is_empty() {
        output::dimmed("No workflows found.");
        return;
    }

    #[derive(Tabled)]
    struct WorkflowRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Trigger")]
        trigger: String,
        #[tabled(rename = "Actions")]
        actions: usize,
        #[tabled(rename = "Updated")]
        updated: String,
    }

    let rows: Vec<WorkflowRow> = workflows
        .iter()
        .map(|w| WorkflowRow {
            id: w.id.to_string(),
            name: output::truncate(&w.name, 40),
            status: w.status.to_string(),
            trigger: describe_trigger(w),
            actions: w.actions.len(),
            updated: output::format_timestamp(&w.updated_at),
        })
        .collect();

    println!("{}", Table::new(rows));
}

fn print_workflow(workflow: &Workflow) {
    output::key_value("ID", &workflow.id);
    output::key_value("Name", &workflow.name);
    output::key_value("Status", output::status_label(workflow.status.as_str()));
    if let Some(description) = &workflow.description {
        output::key_value("Description", description);
    }
    output::key_value("Trigger", describe_trigger(workflow));
    output::key_value("Updated", output::format_timestamp(&workflow.updated_at));

    if !workflow.conditions.is_empty() {
        output::section("Conditions");
        for condition in &workflow.conditions {
            println!(
                "  {} {:?} {}",
                condition.field.cyan(),
                condition.operator,
                condition.value
            );
        }
    }

    output::section("Actions");
    if workflow.actions.is_empty() {
        output::dimmed("  (none)");
    }
    for (i, action) in workflow.actions.iter().enumerate() {
        let detail = match action {
            Action::Tag(c) => c.tag.clone(),
            Action::Assign(c) => c.assignee.clone(),
            Action::Notify(c) => c.channel.clone(),
            Action::TemplateReply(c) => output::preview(&c.template, 60),
        };
        println!("  {}. {} {}", i + 1, action.kind(), detail.dimmed());
    }
}

fn print_executions(executions: &[Execution]) {
    if executions.is_empty() {
        output::dimmed("No executions recorded.");
        return;
    }

    #[derive(Tabled)]
    struct ExecutionRow {
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Detail")]
        detail: String,
    }

    let rows: Vec<ExecutionRow> = executions
        .iter()
        .map(|e| ExecutionRow {
            when: output::format_timestamp(&e.created_at),
            status: e.status.to_string(),
            detail: match &e.error {
                Some(error) => output::preview(error, 60),
                None => output::preview(&e.result.to_string(), 60),
            },
        })
        .collect();

    println!("{}", Table::new(rows));
}

fn print_stats(stats: &ExecutionStats) {
    output::key_value("Runs", stats.total);
    output::key_value("Completed", stats.completed.to_string().green());
    output::key_value("Failed", stats.failed.to_string().red());
    output::key_value("Skipped", stats.skipped);
    if let Some(at) = &stats.last_run_at {
        output::key_value("Last run", output::format_timestamp(at));
    }
    if let Some(error) = &stats.last_error {
        output::key_value("Last error", error);
    }
    if stats.needs_attention {
        output::warning("The most recent run failed");
    }
}
