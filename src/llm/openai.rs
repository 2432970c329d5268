//! OpenAI-compatible chat completions client
//!
//! Works against api.openai.com and any server exposing `/v1/chat/completions`
//! (vLLM, LM Studio, llama.cpp server). The API key is optional for local servers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{LlmClient, LlmError, network_error};
use super::types::Message;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        let base = if self.config.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            self.config.base_url.trim_end_matches('/')
        };
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn build_request(&self, messages: &[Message]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": messages
        })
    }

    fn parse_response(body: &Value) -> Result<String, LlmError> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::InvalidResponse("response has no choices[0].message.content".to_string())
            })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut request = self
            .client
            .post(self.endpoint())
            .json(&self.build_request(messages));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
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
                .unwrap_or(30);
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

        let body: Value = response
            .json()
            .await
            .map_err(|e| network_error(e, self.config.timeout))?;
        Self::parse_response(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.config.model)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}
