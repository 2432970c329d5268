//! Ollama chat client (non-streaming `/api/chat`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{LlmClient, LlmError, network_error};
use super::types::Message;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Configuration for the Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Local model served by Ollama
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = if self.config.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            self.config.base_url.trim_end_matches('/')
        };
        format!("{}/api/chat", base)
    }

    fn build_request(&self, messages: &[Message]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false
        })
    }

    fn parse_response(body: &Value) -> Result<String, LlmError> {
        body["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("response has no message content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.build_request(messages))
            .send()
            .await
            .map_err(|e| network_error(e, self.config.timeout))?;

        let status = response.status();
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
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> OllamaClient {
        OllamaClient::new(OllamaConfig {
            base_url: base_url.to_string(),
            model: "gemma3:12b".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_default() {
        assert_eq!(client("").endpoint(), "http://localhost:11434/api/chat");
        assert_eq!(client("http://gpu-box:11434/").endpoint(), "http://gpu-box:11434/api/chat");
    }

    #[test]
    fn test_build_request_keeps_system_role() {
        let body = client("").build_request(&[Message::system("rules"), Message::user("hi")]);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["stream"], false);
        assert_eq!(body["model"], "gemma3:12b");
    }

    #[test]
    fn test_parse_response() {
        let body = json!({"message": {"role": "assistant", "content": "{\"a\": 1}"}});
        assert_eq!(OllamaClient::parse_response(&body).unwrap(), "{\"a\": 1}");
        assert!(OllamaClient::parse_response(&json!({})).is_err());
    }
}
