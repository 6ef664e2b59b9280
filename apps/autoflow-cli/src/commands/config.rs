//! Configuration management commands

use crate::config::{CliConfig, KEYS};
use crate::ConfigCommands;
use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;

pub async fn run(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(),
        ConfigCommands::Set { key, value } => set_config(&key, value),
        ConfigCommands::Get { key } => get_config(&key),
        ConfigCommands::Reset { force } => reset_config(force),
        ConfigCommands::Path => {
            println!("{}", CliConfig::config_path()?.display());
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config = CliConfig::load()?;
    let path = CliConfig::config_path()?;

    println!("{}: {}", "Config file".bold(), path.display());
    println!();

    for key in KEYS {
        let value = match config.get(key)? {
            Some(_) if *key == "api_key" => "[set]".dimmed(),
            Some(value) => value.normal(),
            None => "(not set)".dimmed(),
        };
        println!("{}: {}", key.cyan(), value);
    }

    Ok(())
}

fn set_config(key: &str, value: String) -> Result<()> {
    let mut config = CliConfig::load()?;
    config.set(key, value)?;
    config.save()?;

    let shown = if key == "api_key" {
        "[redacted]".to_string()
    } else {
        config.get(key)?.unwrap_or_default()
    };
    println!("{} {} = {}", "Set".green(), key.cyan(), shown);

    Ok(())
}

fn get_config(key: &str) -> Result<()> {
    let config = CliConfig::load()?;

    let value = match config.get(key)? {
        Some(_) if key == "api_key" => Some("[redacted]".to_string()),
        other => other,
    };

    match value {
        Some(v) => println!("{}", v),
        None => println!("{}", "(not set)".dimmed()),
    }

    Ok(())
}

fn reset_config(force: bool) -> Result<()> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Reset configuration to defaults?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    let path = CliConfig::config_path()?;
    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    println!("{} configuration", "Reset".green());
    Ok(())
}
