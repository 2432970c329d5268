//! Error types for Toolpilot
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::ProviderError;

/// All error types that can occur in Toolpilot
#[derive(Debug, Error)]
pub enum ToolpilotError {
    /// Invalid or inconsistent configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Capability provider failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Oracle (LLM) failure
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Catalog construction failure
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Toolpilot operations
pub type Result<T> = std::result::Result<T, ToolpilotError>;
