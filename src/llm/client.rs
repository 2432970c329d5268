//! Oracle trait, error type, and client factory

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::types::Message;
use super::{
    AnthropicClient, AnthropicConfig, OfflineClient, OllamaClient, OllamaConfig, OpenAiClient, OpenAiConfig,
};
use crate::config::LlmConfig;

/// Language-understanding oracle
///
/// One call, one answer. Callers send exactly one system instruction followed by
/// conversational content and get free text back, possibly wrapping a JSON object.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response for the given messages
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Errors that can occur during oracle calls
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::JsonError(_) => false,
            LlmError::MissingApiKey { .. } => false,
            LlmError::Unavailable(_) => false,
        }
    }
}

/// Map a reqwest failure, folding client-side timeouts into `LlmError::Timeout`
pub(crate) fn network_error(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Network(err)
    }
}

/// Longest pause between attempts, whatever the server asks for
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Retries transient oracle failures
///
/// Rate limits wait for the server's `retry-after` (capped), other retryable
/// errors wait for the configured backoff, doubled after each attempt.
pub struct RetryingClient {
    inner: Arc<dyn LlmClient>,
    retries: u32,
    backoff: Duration,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn LlmClient>, retries: u32, backoff: Duration) -> Self {
        Self { inner, retries, backoff }
    }

    fn delay(&self, err: &LlmError, attempt: u32) -> Duration {
        let delay = match err {
            LlmError::RateLimited { retry_after } => *retry_after,
            _ => self.backoff.saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(MAX_RETRY_DELAY)
    }
}

#[async_trait]
impl LlmClient for RetryingClient {
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(messages).await {
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = self.delay(&e, attempt);
                    log::warn!(
                        "Oracle '{}' failed ({}), retry {}/{} in {:?}",
                        self.inner.name(),
                        e,
                        attempt + 1,
                        self.retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

fn api_key(config: &LlmConfig, default_env: &str) -> Option<String> {
    let env_var = config.api_key_env.as_deref().unwrap_or(default_env);
    std::env::var(env_var).ok().filter(|k| !k.is_empty())
}

fn require_api_key(config: &LlmConfig, default_env: &str) -> Result<String, LlmError> {
    api_key(config, default_env).ok_or_else(|| LlmError::MissingApiKey {
        env_var: config.api_key_env.clone().unwrap_or_else(|| default_env.to_string()),
    })
}

/// Build the oracle named by `config.provider`
///
/// Remote oracles are wrapped in a [`RetryingClient`] when `max-retries` is non-zero.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let base_url = config.base_url.clone().unwrap_or_default();
    let client: Arc<dyn LlmClient> = match config.provider.to_lowercase().as_str() {
        "anthropic" => {
            let api_key = require_api_key(config, "ANTHROPIC_API_KEY")?;
            let base_url = if base_url.is_empty() {
                super::anthropic::DEFAULT_BASE_URL.to_string()
            } else {
                base_url
            };
            Arc::new(AnthropicClient::with_api_key(
                api_key,
                AnthropicConfig {
                    base_url,
                    model: config.model.clone(),
                    max_tokens: config.max_tokens,
                    timeout,
                },
            )?)
        }
        "openai" => {
            // Local OpenAI-compatible servers usually run without a key
            let api_key = if base_url.is_empty() {
                Some(require_api_key(config, "OPENAI_API_KEY")?)
            } else {
                api_key(config, "OPENAI_API_KEY")
            };
            Arc::new(OpenAiClient::new(
                api_key,
                OpenAiConfig {
                    base_url,
                    model: config.model.clone(),
                    max_tokens: config.max_tokens,
                    timeout,
                },
            )?)
        }
        "ollama" => Arc::new(OllamaClient::new(OllamaConfig {
            base_url,
            model: config.model.clone(),
            timeout,
        })?),
        "offline" | "none" => return Ok(Arc::new(OfflineClient)),
        other => return Err(LlmError::Unavailable(format!("unknown oracle provider '{}'", other))),
    };

    if config.max_retries == 0 {
        return Ok(client);
    }
    Ok(Arc::new(RetryingClient::new(
        client,
        config.max_retries,
        Duration::from_millis(config.retry_backoff_ms),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FlakyClient {
        outcomes: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl FlakyClient {
        fn new(outcomes: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for FlakyClient {
        async fn generate(&self, _messages: &[Message]) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_retrying_client_recovers_from_timeout() {
        let inner = FlakyClient::new(vec![Err(LlmError::Timeout(Duration::from_secs(1))), Ok("done".to_string())]);
        let client = RetryingClient::new(inner.clone(), 2, Duration::from_millis(1));

        assert_eq!(client.generate(&[Message::user("hi")]).await.unwrap(), "done");
        assert_eq!(inner.calls(), 2);
        assert_eq!(client.name(), "flaky");
    }

    #[tokio::test]
    async fn test_retrying_client_gives_up_after_limit() {
        let inner = FlakyClient::new(vec![
            Err(LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Err(LlmError::Timeout(Duration::from_secs(1))),
            Ok("too late".to_string()),
        ]);
        let client = RetryingClient::new(inner.clone(), 1, Duration::from_millis(1));

        assert!(matches!(client.generate(&[]).await, Err(LlmError::Timeout(_))));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_retrying_client_does_not_retry_permanent_errors() {
        let inner = FlakyClient::new(vec![
            Err(LlmError::InvalidResponse("garbled".to_string())),
            Ok("unused".to_string()),
        ]);
        let client = RetryingClient::new(inner.clone(), 3, Duration::from_millis(1));

        assert!(matches!(client.generate(&[]).await, Err(LlmError::InvalidResponse(_))));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn test_retry_delay() {
        let client = RetryingClient::new(FlakyClient::new(vec![]), 3, Duration::from_millis(100));
        let timeout = LlmError::Timeout(Duration::from_secs(1));
        assert_eq!(client.delay(&timeout, 0), Duration::from_millis(100));
        assert_eq!(client.delay(&timeout, 2), Duration::from_millis(400));

        let limited = LlmError::RateLimited {
            retry_after: Duration::from_secs(600),
        };
        assert_eq!(client.delay(&limited, 0), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_llm_error_is_retryable() {
        assert!(
            LlmError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );

        assert!(
            LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string()
            }
            .is_retryable()
        );

        assert!(
            !LlmError::ApiError {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );

        assert!(LlmError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!LlmError::InvalidResponse("bad".to_string()).is_retryable());
        assert!(!LlmError::Unavailable("offline".to_string()).is_retryable());
    }

    #[test]
    fn test_create_offline_client() {
        let config = LlmConfig {
            provider: "offline".to_string(),
            ..LlmConfig::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "offline");
    }

    #[test]
    fn test_create_ollama_client() {
        let config = LlmConfig {
            provider: "Ollama".to_string(),
            base_url: Some("http://localhost:11434".to_string()),
            model: "llama3".to_string(),
            ..LlmConfig::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "ollama");
    }

    #[test]
    fn test_create_local_openai_client_without_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            base_url: Some("http://localhost:8000/v1".to_string()),
            api_key_env: Some("TOOLPILOT_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            model: "qwen2.5".to_string(),
            max_retries: 0,
            ..LlmConfig::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn test_create_hosted_openai_requires_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key_env: Some("TOOLPILOT_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::MissingApiKey { .. })));
    }

    #[test]
    fn test_create_anthropic_without_key() {
        let config = LlmConfig {
            provider: "anthropic".to_string(),
            api_key_env: Some("TOOLPILOT_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..LlmConfig::default()
        };
        let result = create_client(&config);
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::Unavailable(_))));
    }
}
