//! Anthropic API client implementation
//!
//! Implements the LlmClient trait for the Anthropic Messages API. The oracle only
//! needs plain text back, so tool-use blocks are ignored and text blocks are joined.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{LlmClient, LlmError, network_error};
use super::types::{Message, Role, split_system};

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default model to use
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Configuration for the Anthropic client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

impl AnthropicConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Anthropic API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicClient {
    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the request body for the Messages API
    fn build_request(&self, messages: &[Message]) -> Value {
        let (system, conversation) = split_system(messages);

        let messages: Vec<Value> = conversation
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages
        });

        if !system.is_empty() {
            body["system"] = json!(system);
        }

        body
    }

    /// Extract the text content from an API response
    fn parse_response(body: &Value) -> Result<String, LlmError> {
        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("response has no content array".to_string()))?;

        let text = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    /// Send a request to the Anthropic API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(e, self.config.timeout))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| network_error(e, self.config.timeout))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = self.build_request(messages);
        let response = self.send_request(body).await?;
        Self::parse_response(&response)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::with_api_key("test-key".to_string(), AnthropicConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = AnthropicConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_config_with_model() {
        let config = AnthropicConfig::with_model("claude-3-haiku-20240307");
        assert_eq!(config.model, "claude-3-haiku-20240307");
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = AnthropicConfig {
            base_url: "http://proxy.local/".to_string(),
            ..Default::default()
        };
        let client = AnthropicClient::with_api_key("k".to_string(), config).unwrap();
        assert_eq!(client.endpoint(), "http://proxy.local/v1/messages");
    }

    #[test]
    fn test_build_request_separates_system() {
        let messages = vec![Message::system("You extract parameters"), Message::user("Hello")];

        let body = client().build_request(&messages);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["system"], "You extract parameters");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_build_request_without_system() {
        let body = client().build_request(&[Message::user("Hi")]);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "second"}
            ]
        });
        assert_eq!(AnthropicClient::parse_response(&body).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_parse_response_missing_content() {
        let body = json!({"type": "error"});
        assert!(matches!(
            AnthropicClient::parse_response(&body),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
