//! HTTP provider
//!
//! Posts `{"tool": name, "arguments": {...}}` to the configured endpoint. Connection
//! failures surface as "not connected" so the caller can retry over the built-in endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::config::ProviderConfig;
use crate::error::{Result, ToolpilotError};

use super::definition::ToolDescriptor;
use super::provider::{CapabilityProvider, ProviderError, payload_error};

pub struct HttpProvider {
    id: String,
    description: String,
    endpoint: String,
    builtin_endpoint: Option<String>,
    tools: Vec<ToolDescriptor>,
    timeout: Duration,
    client: Client,
}

impl HttpProvider {
    /// Registry factory
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn CapabilityProvider>> {
        Ok(Arc::new(Self::from_config(config)?))
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ToolpilotError::Config(format!("http provider '{}' needs an endpoint", config.id)))?;
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolpilotError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            id: config.id.clone(),
            description: config.description.clone(),
            endpoint,
            builtin_endpoint: config.builtin_endpoint.clone(),
            tools: config
                .tools
                .iter()
                .map(|t| ToolDescriptor::from_config(&config.id, t))
                .collect(),
            timeout,
            client,
        })
    }

    fn request_body(name: &str, args: &Map<String, Value>) -> Value {
        json!({ "tool": name, "arguments": args })
    }

    async fn post(
        &self,
        url: &str,
        name: &str,
        args: &Map<String, Value>,
    ) -> std::result::Result<Value, ProviderError> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(ProviderError::UnknownTool(name.to_string()));
        }

        let response = self
            .client
            .post(url)
            .json(&Self::request_body(name, args))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::NotConnected(self.id.clone())
                } else if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Call(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Call(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Call(format!("invalid response body: {}", e)))?;

        match payload_error(&body) {
            Some(message) => Err(ProviderError::Call(message)),
            None => Ok(body),
        }
    }
}

#[async_trait]
impl CapabilityProvider for HttpProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> std::result::Result<Value, ProviderError> {
        self.post(&self.endpoint, name, args).await
    }

    async fn call_tool_builtin(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> std::result::Result<Value, ProviderError> {
        match &self.builtin_endpoint {
            Some(url) => self.post(url, name, args).await,
            None => Err(ProviderError::NoBuiltin(self.id.clone())),
        }
    }
}
