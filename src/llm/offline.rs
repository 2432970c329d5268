//! Oracle stand-in for running without a language model

use async_trait::async_trait;

use super::client::{LlmClient, LlmError};
use super::types::Message;

/// Always unavailable. Extraction degrades to pattern matching, selection to
/// scoring alone, and rendering skips the cosmetic pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

#[async_trait]
impl LlmClient for OfflineClient {
    async fn generate(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::Unavailable("no oracle configured".to_string()))
    }

    fn name(&self) -> &str {
        "offline"
    }
}
