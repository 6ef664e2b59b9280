//! Output formatting utilities
//!
//! Records go to stdout in the selected format. Status lines and notices go
//! to stderr so JSON and YAML output stays machine-readable.

use autoflow_workflow::{Notice, NoticeLevel, Notifier};
use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text and tables
    #[default]
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" | "table" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Serialize for a structured format; `None` for text
pub fn format_output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<Option<String>> {
    match format {
        OutputFormat::Text => Ok(None),
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
        OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
    }
}

/// Print `value` as JSON or YAML, or call `text` to render it for humans
pub fn emit<T, F>(value: &T, format: OutputFormat, text: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    match format_output(value, format)? {
        Some(rendered) => println!("{}", rendered.trim_end()),
        None => text(value),
    }
    Ok(())
}

/// Shows service notices on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => success(&notice.message),
            NoticeLevel::Info => info(&notice.message),
            NoticeLevel::Error => error(&notice.message),
        }
    }
}

/// Print a success message
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message);
}

/// Print a key-value pair
pub fn key_value(key: &str, value: impl std::fmt::Display) {
    println!("{}: {}", key.bold(), value);
}

/// Print a dimmed message
pub fn dimmed(message: &str) {
    println!("{}", message.dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.bold().underline());
}

/// Colour a status word by how much attention it needs
pub fn status_label(status: &str) -> ColoredString {
    match status {
        "active" | "sent" | "completed" => status.green(),
        "pending" | "draft" | "saved" => status.yellow(),
        "failed" | "rejected" => status.red(),
        "paused" | "skipped" => status.dimmed(),
        _ => status.normal(),
    }
}

/// Local wall-clock rendering of a stored timestamp
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate a string to at most `max_len` characters
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Single-line preview of free text for table cells
pub fn preview(s: &str, max_len: usize) -> String {
    truncate(&s.split_whitespace().collect::<Vec<_>>().join(" "), max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        assert_eq!(preview("Where\n is   my\torder?", 40), "Where is my order?");
    }

    #[test]
    fn test_text_format_renders_nothing() {
        let value = serde_json::json!({"id": "wf-1"});
        assert!(format_output(&value, OutputFormat::Text).unwrap().is_none());
        let json = format_output(&value, OutputFormat::Json).unwrap().unwrap();
        assert!(json.contains("\"wf-1\""));
    }
}
