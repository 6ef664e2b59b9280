//! Suggestion and notification preference commands

use crate::commands::Session;
use crate::output;
use crate::{GlobalArgs, SuggestionCommands};
use anyhow::Result;
use autoflow_core::{RuleId, SuggestionId, SuggestionSummary};
use colored::Colorize;
use tabled::{Table, Tabled};

pub async fn run(global: &GlobalArgs, cmd: SuggestionCommands) -> Result<()> {
    let session = Session::resolve(global)?;
    let format = session.format;
    let center = session.services()?.suggestions;

    match cmd {
        SuggestionCommands::Summary => {
            let summary = center.summary().await?;
            output::emit(&summary, format, print_summary)
        }
        SuggestionCommands::Accept { id } => {
            center.accept(&SuggestionId::new(id)).await?;
            Ok(())
        }
        SuggestionCommands::Reject { id } => {
            center.reject(&SuggestionId::new(id)).await?;
            Ok(())
        }
        SuggestionCommands::Mute {
            suggestion_type,
            rule,
        } => {
            center.mute(&suggestion_type, rule.map(RuleId::new)).await?;
            Ok(())
        }
        SuggestionCommands::Digest { state } => {
            // Load first so a failed write can restore what was shown
            center.prefs().await?;
            let prefs = center.set_weekly_digest(state == "on").await?;
            output::emit(&prefs, format, |_| {})
        }
    }
}

fn print_summary(summary: &SuggestionSummary) {
    let unread = if summary.unread_count > 0 {
        summary.unread_count.to_string().yellow().bold()
    } else {
        summary.unread_count.to_string().normal()
    };
    output::key_value("Unread", unread);
    output::key_value(
        "Weekly digest",
        if summary.prefs.weekly_digest_opt_in {
            "on"
        } else {
            "off"
        },
    );

    output::section("Quick wins");
    if summary.quick_wins.is_empty() {
        output::dimmed("No suggestions right now.");
    } else {
        #[derive(Tabled)]
        struct SuggestionRow {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Type")]
            suggestion_type: String,
            #[tabled(rename = "Title")]
            title: String,
            #[tabled(rename = "Rule")]
            rule: String,
            #[tabled(rename = "Saves")]
            savings: String,
        }

        let rows: Vec<SuggestionRow> = summary
            .quick_wins
            .iter()
            .map(|s| SuggestionRow {
                id: s.id.to_string(),
                suggestion_type: s.suggestion_type.clone(),
                title: output::truncate(&s.title, 40),
                rule: s
                    .rule_id
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |r| r.to_string()),
                savings: s
                    .predicted_savings_minutes
                    .map_or_else(|| "-".to_string(), |m| format!("{} min/wk", m)),
            })
            .collect();

        println!("{}", Table::new(rows));
    }

    if !summary.badges.is_empty() {
        output::section("Rules with suggestions");
        for (rule, badge) in &summary.badges {
            match badge.predicted_weekly_savings_minutes {
                Some(minutes) => {
                    println!("  {} {}", rule.cyan(), format!("~{} min/wk", minutes).dimmed())
                }
                None => println!("  {}", rule.cyan()),
            }
        }
    }
}
