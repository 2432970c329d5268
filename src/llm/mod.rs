//! Oracle layer - the language-understanding service behind extraction, selection,
//! and cosmetic rendering
//!
//! This module provides:
//! - Message types for oracle communication
//! - LlmClient trait for provider abstraction
//! - Anthropic, OpenAI-compatible, Ollama, and offline implementations
//! - Retry wrapper for transient failures
//! - JSON object recovery from free-form responses

pub mod anthropic;
pub mod client;
pub mod json;
pub mod offline;
pub mod ollama;
pub mod openai;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, RetryingClient, create_client};
pub use json::{RecoveryError, extract_json_object};
pub use offline::OfflineClient;
pub use ollama::{OllamaClient, OllamaConfig};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{Message, Role, instruction};
