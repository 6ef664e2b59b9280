//! Autoflow API client implementation

use async_trait::async_trait;
use autoflow_core::{
    ApiConfig, Approval, ApprovalId, ApprovalPatch, ApprovalStatus, AutomationBackend,
    AutomationError, Execution, MuteRule, NewWorkflow, NotificationPrefs, Result, SuggestionId,
    SuggestionSummary, Workflow, WorkflowId, WorkflowPatch, WorkflowStatus,
};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{from_status, from_transport};

/// Client for the workflow automation REST API
#[derive(Clone)]
pub struct AutomationClient {
    http: Client,
    base_url: Url,
    api_key: Option<Secret<String>>,
}

impl std::fmt::Debug for AutomationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Builder for creating an AutomationClient
#[derive(Default)]
pub struct AutomationClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl AutomationClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL for the API
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API key for authentication
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a custom user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AutomationClient> {
        let raw = self
            .base_url
            .unwrap_or_else(|| "http://localhost:8080".to_string());

        // Relative joins keep any path prefix only when the base ends in '/'
        let normalized = if raw.ends_with('/') {
            raw
        } else {
            format!("{}/", raw)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AutomationError::validation(format!("invalid base URL: {}", e)))?;

        let timeout = self.timeout.unwrap_or(Duration::from_secs(30));
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("autoflow-sdk/{}", env!("CARGO_PKG_VERSION")));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| AutomationError::validation(format!("invalid HTTP client settings: {}", e)))?;

        Ok(AutomationClient {
            http,
            base_url,
            api_key: self.api_key.map(Secret::new),
        })
    }
}

impl AutomationClient {
    /// Create a new client builder
    pub fn builder() -> AutomationClientBuilder {
        AutomationClientBuilder::new()
    }

    /// Create a client with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .base_url(config.base_url.clone())
            .api_key(config.api_key.clone())
            .timeout(config.timeout());
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL for an endpoint, relative to the base URL
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AutomationError::validation(format!("invalid path {}: {}", path, e)))
    }

    /// Start a request with authentication applied
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key.expose_secret()),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await.map_err(from_transport)?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = from_status(status, &body);
        warn!(status = status.as_u16(), kind = err.kind(), "API request failed");
        Err(err)
    }

    /// Send and decode a JSON body
    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = self.send(req).await?;
        let bytes = response.bytes().await.map_err(from_transport)?;
        serde_json::from_slice(&bytes).map_err(AutomationError::from)
    }

    /// Send and ignore any body
    async fn execute(&self, req: RequestBuilder) -> Result<()> {
        self.send(req).await.map(|_| ())
    }

    fn with_status_filter(&self, path: &str, status: Option<&str>) -> Result<Url> {
        let mut url = self.url(path)?;
        if let Some(s) = status {
            url.query_pairs_mut().append_pair("status_eq", s);
        }
        Ok(url)
    }
}

#[async_trait]
impl AutomationBackend for AutomationClient {
    // ===== Workflow API =====

    #[instrument(skip(self, definition), fields(name = %definition.name))]
    async fn create_workflow(&self, definition: NewWorkflow) -> Result<Workflow> {
        let req = self
            .request(Method::POST, self.url("workflows")?)
            .json(&definition);
        self.fetch(req).await
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        let req = self.request(Method::GET, self.url(&format!("workflows/{}", id))?);
        self.fetch(req).await
    }

    #[instrument(skip(self))]
    async fn list_workflows(&self, status: Option<WorkflowStatus>) -> Result<Vec<Workflow>> {
        let url = self.with_status_filter("workflows", status.as_ref().map(|s| s.as_str()))?;
        self.fetch(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self, patch), fields(workflow_id = %id))]
    async fn update_workflow(&self, id: &WorkflowId, patch: WorkflowPatch) -> Result<Workflow> {
        let req = self
            .request(Method::PATCH, self.url(&format!("workflows/{}", id))?)
            .json(&patch);
        self.fetch(req).await
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn activate_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        let req = self.request(
            Method::POST,
            self.url(&format!("workflows/{}/activate", id))?,
        );
        self.fetch(req).await
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn pause_workflow(&self, id: &WorkflowId) -> Result<Workflow> {
        let req = self.request(Method::POST, self.url(&format!("workflows/{}/pause", id))?);
        self.fetch(req).await
    }

    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    async fn list_executions(&self, workflow_id: &WorkflowId) -> Result<Vec<Execution>> {
        let req = self.request(
            Method::GET,
            self.url(&format!("workflows/{}/executions", workflow_id))?,
        );
        self.fetch(req).await
    }

    // ===== Approval API =====

    #[instrument(skip(self))]
    async fn list_approvals(&self, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        let url = self.with_status_filter(
            "workflows/approvals",
            status.as_ref().map(|s| s.as_str()),
        )?;
        self.fetch(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(approval_id = %id))]
    async fn get_approval(&self, id: &ApprovalId) -> Result<Approval> {
        let req = self.request(
            Method::GET,
            self.url(&format!("workflows/approvals/{}", id))?,
        );
        self.fetch(req).await
    }

    #[instrument(skip(self, patch), fields(approval_id = %id))]
    async fn update_approval(&self, id: &ApprovalId, patch: ApprovalPatch) -> Result<Approval> {
        let req = self
            .request(
                Method::PATCH,
                self.url(&format!("workflows/approvals/{}", id))?,
            )
            .json(&patch);
        self.fetch(req).await
    }

    #[instrument(skip(self), fields(approval_id = %id))]
    async fn send_approval(&self, id: &ApprovalId) -> Result<Approval> {
        let req = self.request(
            Method::POST,
            self.url(&format!("workflows/approvals/{}/send", id))?,
        );
        self.fetch(req).await
    }

    #[instrument(skip(self, reason), fields(approval_id = %id))]
    async fn reject_approval(&self, id: &ApprovalId, reason: Option<String>) -> Result<Approval> {
        let mut url = self.url(&format!("workflows/approvals/{}/reject", id))?;
        if let Some(r) = &reason {
            url.query_pairs_mut().append_pair("reason", r);
        }
        self.fetch(self.request(Method::POST, url)).await
    }

    // ===== Suggestion API =====

    #[instrument(skip(self))]
    async fn suggestion_summary(&self) -> Result<SuggestionSummary> {
        let req = self.request(Method::GET, self.url("automation/suggestions/summary")?);
        self.fetch(req).await
    }

    #[instrument(skip(self), fields(suggestion_id = %id))]
    async fn accept_suggestion(&self, id: &SuggestionId) -> Result<()> {
        let req = self.request(
            Method::POST,
            self.url(&format!("automation/suggestions/{}/accept", id))?,
        );
        self.execute(req).await
    }

    #[instrument(skip(self), fields(suggestion_id = %id))]
    async fn reject_suggestion(&self, id: &SuggestionId) -> Result<()> {
        let req = self.request(
            Method::POST,
            self.url(&format!("automation/suggestions/{}/reject", id))?,
        );
        self.execute(req).await
    }

    #[instrument(skip(self), fields(suggestion_type = %rule.suggestion_type))]
    async fn mute_suggestions(&self, rule: MuteRule) -> Result<()> {
        let req = self
            .request(Method::POST, self.url("automation/suggestions/mute")?)
            .json(&rule);
        self.execute(req).await
    }

    #[instrument(skip(self))]
    async fn notification_prefs(&self) -> Result<NotificationPrefs> {
        let req = self.request(Method::GET, self.url("automation/notifications/prefs")?);
        self.fetch(req).await
    }

    #[instrument(skip(self))]
    async fn set_notification_prefs(&self, prefs: NotificationPrefs) -> Result<NotificationPrefs> {
        debug!(weekly_digest_opt_in = prefs.weekly_digest_opt_in, "Writing notification prefs");
        let req = self
            .request(Method::POST, self.url("automation/notifications/prefs")?)
            .json(&prefs);
        self.fetch(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let client = AutomationClient::builder()
            .base_url("http://localhost:8080")
            .api_key(Some("test-key".to_string()))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "http://localhost:8080/");
        assert!(!format!("{:?}", client).contains("test-key"));
    }

    #[test]
    fn test_url_building_keeps_prefix() {
        let client = AutomationClient::new("https://app.example.com/api/v1").unwrap();
        let url = client.url("/workflows/approvals").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/api/v1/workflows/approvals");
    }

    #[test]
    fn test_status_filter_query() {
        let client = AutomationClient::new("http://localhost:8080").unwrap();
        let url = client
            .with_status_filter("workflows/approvals", Some("pending"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/workflows/approvals?status_eq=pending"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = AutomationClient::new("not a url");
        assert!(matches!(result, Err(AutomationError::Validation(_))));
    }

    #[test]
    fn test_from_config() {
        let config = ApiConfig::new("http://backend:9000").with_timeout(5);
        let client = AutomationClient::from_config(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "http://backend:9000/");
    }
}
