//! CLI configuration management

use anyhow::{bail, Context};
use autoflow_core::ApiConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Keys accepted by `autoflow config set/get`
pub const KEYS: &[&str] = &["api_url", "api_key", "output_format", "timeout_seconds"];

/// User configuration kept in `<config dir>/autoflow/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// API server URL
    pub api_url: Option<String>,
    /// API authentication key
    pub api_key: Option<String>,
    /// Default output format
    pub output_format: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Save configuration to default path
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("autoflow").join("config.toml"))
    }

    /// Get a configuration value
    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(match key {
            "api_url" => self.api_url.clone(),
            "api_key" => self.api_key.clone(),
            "output_format" => self.output_format.clone(),
            "timeout_seconds" => self.timeout_seconds.map(|t| t.to_string()),
            _ => bail!("Unknown key '{}', expected one of: {}", key, KEYS.join(", ")),
        })
    }

    /// Set a configuration value
    pub fn set(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        match key {
            "api_url" => self.api_url = Some(value),
            "api_key" => self.api_key = Some(value),
            "output_format" => {
                value
                    .parse::<crate::output::OutputFormat>()
                    .map_err(anyhow::Error::msg)?;
                self.output_format = Some(value);
            }
            "timeout_seconds" => {
                self.timeout_seconds = Some(
                    value
                        .parse()
                        .with_context(|| format!("timeout_seconds must be a number, got '{}'", value))?,
                );
            }
            _ => bail!("Unknown key '{}', expected one of: {}", key, KEYS.join(", ")),
        }
        Ok(())
    }

    /// Layer these settings over `api`; unset keys leave it untouched
    pub fn apply_to(&self, api: &mut ApiConfig) {
        if let Some(url) = &self.api_url {
            api.base_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            api.api_key = Some(key.clone());
        }
        if let Some(timeout) = self.timeout_seconds {
            api.timeout_seconds = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CliConfig::default();
        config.set("api_url", "https://api.example.com".into()).unwrap();
        config.set("timeout_seconds", "5".into()).unwrap();
        config.save_to(&path).unwrap();

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("timeout_seconds").unwrap().as_deref(), Some("5"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, CliConfig::default());
    }

    #[test]
    fn test_rejects_unknown_and_malformed_values() {
        let mut config = CliConfig::default();
        assert!(config.set("default_model", "x".into()).is_err());
        assert!(config.set("timeout_seconds", "soon".into()).is_err());
        assert!(config.set("output_format", "xml".into()).is_err());
        assert!(config.get("nope").is_err());
    }

    #[test]
    fn test_apply_to_overrides_only_set_keys() {
        let mut api = ApiConfig::new("http://localhost:8080");
        let config = CliConfig {
            timeout_seconds: Some(3),
            ..Default::default()
        };
        config.apply_to(&mut api);

        assert_eq!(api.base_url, "http://localhost:8080");
        assert_eq!(api.timeout_seconds, 3);
        assert!(api.api_key.is_none());
    }
}
