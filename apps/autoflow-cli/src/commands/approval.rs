//! Approval queue commands

use crate::commands::Session;
use crate::output;
use crate::{ApprovalCommands, GlobalArgs};
use anyhow::Result;
use autoflow_core::{Approval, ApprovalId, ApprovalStatus};
use colored::Colorize;
use tabled::{Table, Tabled};

pub async fn run(global: &GlobalArgs, cmd: ApprovalCommands) -> Result<()> {
    let session = Session::resolve(global)?;
    let format = session.format;
    let queue = session.services()?.approvals;

    match cmd {
        ApprovalCommands::List { status, all } => {
            let filter = if all {
                None
            } else {
                Some(status.unwrap_or(ApprovalStatus::Pending))
            };
            let approvals = queue.list(filter).await?;
            output::emit(&approvals, format, |a| print_approvals(a))
        }
        ApprovalCommands::Show { id } => {
            let approval = queue.get(&ApprovalId::new(id)).await?;
            output::emit(&approval, format, print_approval)
        }
        ApprovalCommands::Edit { id, text } => {
            let approval = queue.edit(&ApprovalId::new(id), text).await?;
            output::emit(&approval, format, |_| {})
        }
        ApprovalCommands::Save { id } => {
            let approval = queue.save(&ApprovalId::new(id)).await?;
            output::emit(&approval, format, |_| {})
        }
        ApprovalCommands::Send { id } => {
            let approval = queue.send(&ApprovalId::new(id)).await?;
            output::emit(&approval, format, |a| {
                if let Some(link) = &a.link {
                    output::key_value("Link", link);
                }
            })
        }
        ApprovalCommands::Reject { id, reason } => {
            let approval = queue.reject(&ApprovalId::new(id), reason).await?;
            output::emit(&approval, format, |_| {})
        }
    }
}

fn print_approvals(approvals: &[Approval]) {
    if approvals.is_empty() {
        output::dimmed("Nothing waiting for review.");
        return;
    }

    #[derive(Tabled)]
    struct ApprovalRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Platform")]
        platform: String,
        #[tabled(rename = "Type")]
        interaction: String,
        #[tabled(rename = "From")]
        author: String,
        #[tabled(rename = "Message")]
        message: String,
        #[tabled(rename = "Reply")]
        reply: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<ApprovalRow> = approvals
        .iter()
        .map(|a| ApprovalRow {
            id: a.id.to_string(),
            platform: a.platform.to_string(),
            interaction: a.interaction_type.to_string(),
            author: a.author.clone().unwrap_or_else(|| "-".to_string()),
            message: output::preview(&a.user_message, 40),
            reply: output::preview(a.effective_response(), 40),
            status: a.status.to_string(),
        })
        .collect();

    println!("{}", Table::new(rows));
}

fn print_approval(approval: &Approval) {
    output::key_value("ID", &approval.id);
    output::key_value("Status", output::status_label(approval.status.as_str()));
    output::key_value(
        "Channel",
        format!("{} {}", approval.platform, approval.interaction_type),
    );
    if let Some(author) = &approval.author {
        output::key_value("From", author);
    }
    if let Some(link) = &approval.link {
        output::key_value("Link", link);
    }
    if let Some(workflow_id) = &approval.workflow_id {
        output::key_value("Workflow", workflow_id);
    }
    output::key_value("Revision", approval.revision);

    output::section("Message");
    println!("{}", approval.user_message);

    output::section("Reply");
    println!("{}", approval.effective_response());
    if approval.edited_response.is_some() {
        println!(
            "{} {}",
            "originally:".dimmed(),
            approval.proposed_response.dimmed()
        );
    }

    if let Some(reason) = &approval.rejected_reason {
        output::section("Rejected because");
        println!("{}", reason);
    }
}
