//! Autoflow CLI
//!
//! Manage automation workflows, review drafted replies in the approval queue
//! and act on quick-win suggestions from the command line.

mod commands;
mod config;
mod output;
mod telemetry;

use autoflow_core::{ApprovalStatus, InteractionType, Platform, Trigger, WorkflowStatus};
use autoflow_workflow::AutomationError;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "autoflow",
    author = "Autoflow Team",
    version,
    about = "Autoflow - workflow automation for creator inboxes",
    long_about = "A command-line interface for the Autoflow automation API.\n\n\
                  Define workflows that react to comments and DMs, review the\n\
                  replies they draft, and act on suggested quick wins."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// API endpoint URL
    #[arg(short = 'u', long, env = "AUTOFLOW_API_URL", global = true)]
    pub api_url: Option<String>,

    /// API key for authentication
    #[arg(
        short = 'k',
        long,
        env = "AUTOFLOW_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format (text, json, yaml)
    #[arg(short = 'o', long, global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, edit and switch workflows
    #[command(subcommand)]
    Workflow(WorkflowCommands),

    /// Review drafted replies
    #[command(subcommand)]
    Approval(ApprovalCommands),

    /// Act on suggested quick wins
    #[command(subcommand)]
    Suggestion(SuggestionCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Fields of a workflow definition, from a file and/or flags
#[derive(Args, Debug, Default)]
pub struct DefinitionArgs {
    /// Definition file (JSON or YAML)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Workflow name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Workflow description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Trigger as TYPE=VALUE, e.g. sentiment=negative
    #[arg(short, long)]
    pub trigger: Option<Trigger>,

    /// Add a tag action
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Add an assign action
    #[arg(long = "assign")]
    pub assignees: Vec<String>,

    /// Add a notify action for a channel
    #[arg(long = "notify")]
    pub channels: Vec<String>,

    /// Add a template reply action, e.g. "Hi {{author}}!"
    #[arg(long)]
    pub reply: Option<String>,
}

/// A simulated inbound interaction
#[derive(Args, Debug)]
pub struct EventArgs {
    /// Message text
    #[arg(short, long)]
    pub message: String,

    /// Platform the message arrived on
    #[arg(long, default_value = "instagram")]
    pub platform: Platform,

    /// Interaction type (dm, comment, mention)
    #[arg(long = "type", default_value = "dm")]
    pub interaction_type: InteractionType,

    /// Author handle
    #[arg(short, long)]
    pub author: Option<String>,

    /// Classified sentiment
    #[arg(short, long)]
    pub sentiment: Option<String>,

    /// Extra field as KEY=VALUE, available to conditions
    #[arg(long = "field")]
    pub fields: Vec<String>,
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// List workflows
    List {
        /// Only workflows with this status
        #[arg(short, long)]
        status: Option<WorkflowStatus>,
    },
    /// Show workflow details
    Show {
        /// Workflow ID
        id: String,
    },
    /// Create a workflow (draft unless --active)
    Create {
        #[command(flatten)]
        definition: DefinitionArgs,

        /// Create it active
        #[arg(long)]
        active: bool,
    },
    /// Edit a workflow definition
    Update {
        /// Workflow ID
        id: String,

        #[command(flatten)]
        definition: DefinitionArgs,
    },
    /// Activate a workflow
    Activate {
        /// Workflow ID
        id: String,
    },
    /// Pause an active workflow
    Pause {
        /// Workflow ID
        id: String,
    },
    /// Flip a workflow between active and paused
    Toggle {
        /// Workflow ID
        id: String,
    },
    /// Show a workflow's execution log
    Executions {
        /// Workflow ID
        id: String,

        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only failed runs
        #[arg(long)]
        failed: bool,

        /// Show a rollup instead of the log
        #[arg(long)]
        stats: bool,
    },
    /// Validate a workflow definition file
    Validate {
        /// Workflow file path
        file: PathBuf,
    },
    /// Run a definition file against a sample event, locally
    Test {
        /// Workflow file path
        file: PathBuf,

        #[command(flatten)]
        event: EventArgs,
    },
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List approvals (pending by default)
    List {
        /// Only approvals with this status
        #[arg(short, long, conflicts_with = "all")]
        status: Option<ApprovalStatus>,

        /// Every approval regardless of status
        #[arg(long)]
        all: bool,
    },
    /// Show approval details
    Show {
        /// Approval ID
        id: String,
    },
    /// Replace the drafted reply text
    Edit {
        /// Approval ID
        id: String,
        /// New reply text
        text: String,
    },
    /// Set an approval aside for later
    Save {
        /// Approval ID
        id: String,
    },
    /// Deliver the reply
    Send {
        /// Approval ID
        id: String,
    },
    /// Reject the drafted reply
    Reject {
        /// Approval ID
        id: String,

        /// Why the draft was rejected
        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SuggestionCommands {
    /// Show quick wins, badges and preferences
    Summary,
    /// Accept a suggestion, queueing its draft for approval
    Accept {
        /// Suggestion ID
        id: String,
    },
    /// Dismiss a suggestion
    Reject {
        /// Suggestion ID
        id: String,
    },
    /// Stop surfacing a kind of suggestion
    Mute {
        /// Suggestion type, e.g. faq_reply
        suggestion_type: String,

        /// Only for this rule
        #[arg(short, long)]
        rule: Option<String>,
    },
    /// Turn the weekly digest email on or off
    Digest {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let global = cli.global;

    if global.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = telemetry::init(&global.log_level, global.json_logs) {
        eprintln!("{}: {}", "Warning".yellow(), e);
    }

    let result = match cli.command {
        Commands::Workflow(cmd) => commands::workflow::run(&global, cmd).await,
        Commands::Approval(cmd) => commands::approval::run(&global, cmd).await,
        Commands::Suggestion(cmd) => commands::suggestion::run(&global, cmd).await,
        Commands::Config(cmd) => commands::config::run(cmd).await,
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            // Service failures were already shown as a notice
            match e.downcast_ref::<AutomationError>() {
                Some(err) if global.verbose => {
                    eprintln!("{}: {} ({})", "Error".red().bold(), err, err.kind());
                }
                Some(_) => {}
                None => {
                    eprintln!("{}: {}", "Error".red().bold(), e);
                    if global.verbose {
                        for cause in e.chain().skip(1) {
                            eprintln!("{}: {}", "Caused by".yellow(), cause);
                        }
                    }
                }
            }
            ExitCode::FAILURE
        }
    }
}
