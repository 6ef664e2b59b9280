//! CLI command implementations

pub mod approval;
pub mod config;
pub mod suggestion;
pub mod workflow;

use anyhow::{Context, Result};
use autoflow_core::AutomationConfig;
use autoflow_sdk::AutomationClient;
use autoflow_workflow::{AutomationServices, ServiceContext};
use std::sync::Arc;

use crate::config::CliConfig;
use crate::output::{ConsoleNotifier, OutputFormat};
use crate::GlobalArgs;

/// Settings resolved for one invocation
///
/// Precedence, highest first: command-line flags (and their `AUTOFLOW_API_*`
/// env vars), the user config file, `AUTOFLOW__*` settings, built-in defaults.
pub struct Session {
    pub format: OutputFormat,
    pub config: AutomationConfig,
}

impl Session {
    pub fn resolve(global: &GlobalArgs) -> Result<Self> {
        let user = CliConfig::load()?;
        let mut config = AutomationConfig::load().context("Failed to load AUTOFLOW settings")?;

        user.apply_to(&mut config.api);
        if let Some(url) = &global.api_url {
            config.api.base_url = url.clone();
        }
        if let Some(key) = &global.api_key {
            config.api.api_key = Some(key.clone());
        }
        if let Some(timeout) = global.timeout {
            config.api.timeout_seconds = timeout;
        }
        if config.api.user_agent.is_none() {
            config.api.user_agent = Some(format!("autoflow-cli/{}", env!("CARGO_PKG_VERSION")));
        }

        let format = match (global.format, user.output_format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(configured)) => configured.parse().map_err(anyhow::Error::msg)?,
            (None, None) => OutputFormat::default(),
        };

        Ok(Self { format, config })
    }

    /// Services bound to the HTTP client, reporting notices on the console
    pub fn services(&self) -> Result<AutomationServices> {
        let client = AutomationClient::from_config(&self.config.api)
            .with_context(|| format!("Cannot connect to {}", self.config.api.base_url))?;
        tracing::debug!(base_url = %self.config.api.base_url, "Using automation API");

        let ctx = ServiceContext::from_config(Arc::new(client), &self.config)
            .with_notifier(Arc::new(ConsoleNotifier));
        Ok(AutomationServices::new(ctx))
    }
}
