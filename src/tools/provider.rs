//! Capability provider seam
//!
//! A provider owns tools and knows how to call them. The pipeline never talks to a
//! transport directly.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::definition::ToolDescriptor;

/// Error markers that mean "primary transport unavailable, try the built-in one"
pub const NOT_CONNECTED_MARKERS: &[&str] = &["not connected", "не подключен"];

/// Default per-call timeout when a provider does not declare one
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by provider calls
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{0}' not connected")]
    NotConnected(String),

    #[error("{0}")]
    Call(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider '{0}' has no built-in transport")]
    NoBuiltin(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

impl ProviderError {
    /// Whether the error text carries a "not connected" marker
    pub fn is_not_connected(&self) -> bool {
        is_not_connected(&self.to_string())
    }
}

/// Check an error message for any "not connected" marker, case-insensitively
pub fn is_not_connected(message: &str) -> bool {
    let lower = message.to_lowercase();
    NOT_CONNECTED_MARKERS.iter().any(|m| lower.contains(m))
}

/// Extract the message of a `{"error": ...}` payload, if the value is one
pub fn payload_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An adapter owning one or more tools
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Provider identifier; matches `ToolDescriptor::owner`
    fn id(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> String;

    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Upper bound for one call on either transport
    fn timeout(&self) -> Duration {
        DEFAULT_CALL_TIMEOUT
    }

    /// Call a tool over the primary transport
    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ProviderError>;

    /// Call a tool over the secondary built-in transport
    async fn call_tool_builtin(&self, _name: &str, _args: &Map<String, Value>) -> Result<Value, ProviderError> {
        Err(ProviderError::NoBuiltin(self.id().to_string()))
    }
}
