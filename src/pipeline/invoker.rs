//! Parameter synthesis and tool invocation
//!
//! Only declared parameters are ever sent. Each call runs under the owning provider's
//! timeout; a primary transport reporting "not connected" is retried once over the
//! built-in transport.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::tools::{ProviderError, ToolCatalog, ToolDescriptor, payload_error};

use super::candidate::{CandidateParameter, ranked_for};
use super::patterns::extract_for_param;

/// Outcome of one invocation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Success(Value),
    /// Required parameters with no usable value
    MissingParams(Vec<String>),
    /// Required parameters whose only values could not take the declared type
    InvalidParams(Vec<String>),
    ToolError(String),
    /// Provider unavailable on every transport
    FallbackNeeded(String),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Success(_) => write!(f, "success"),
            ExecutionResult::MissingParams(names) => write!(f, "missing required parameters: {}", names.join(", ")),
            ExecutionResult::InvalidParams(names) => write!(f, "invalid parameters: {}", names.join(", ")),
            ExecutionResult::ToolError(message) => write!(f, "{}", message),
            ExecutionResult::FallbackNeeded(reason) => write!(f, "{}", reason),
        }
    }
}

/// Arguments built for one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    pub arguments: Map<String, Value>,
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

/// Fill every declared parameter from the best usable candidate
///
/// A candidate is usable when valid, above `min_confidence`, mapped onto the parameter
/// through the synonym table, and coercible to the declared type. A required parameter
/// with no usable candidate gets one targeted pattern pass over the utterance. A declared
/// default fills any parameter the request offered nothing for.
pub fn synthesize(
    tool: &ToolDescriptor,
    candidates: &[CandidateParameter],
    utterance: &str,
    min_confidence: f64,
) -> Synthesis {
    let mut synthesis = Synthesis::default();

    for param in &tool.params {
        let ranked = ranked_for(candidates, &param.name, min_confidence);
        let coerced = ranked.iter().find_map(|c| param.param_type.coerce(&c.value));
        if let Some(value) = coerced {
            synthesis.arguments.insert(param.name.clone(), value);
            continue;
        }

        let targeted = if param.required {
            extract_for_param(&param.name, utterance).and_then(|raw| param.param_type.coerce(&raw))
        } else {
            None
        };
        if let Some(value) = targeted {
            log::debug!("Filled '{}' from the utterance", param.name);
            synthesis.arguments.insert(param.name.clone(), value);
            continue;
        }

        if ranked.is_empty()
            && let Some(value) = param.default_value()
        {
            log::debug!("Filled '{}' from its default", param.name);
            synthesis.arguments.insert(param.name.clone(), value);
            continue;
        }

        if !param.required {
            continue;
        }
        if ranked.is_empty() {
            synthesis.missing.push(param.name.clone());
        } else {
            synthesis.invalid.push(param.name.clone());
        }
    }
    synthesis
}

pub struct ToolInvoker {
    min_confidence: f64,
}

impl ToolInvoker {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Synthesize arguments and call the tool
    pub async fn invoke(
        &self,
        catalog: &ToolCatalog,
        tool: &ToolDescriptor,
        candidates: &[CandidateParameter],
        utterance: &str,
    ) -> ExecutionResult {
        let synthesis = synthesize(tool, candidates, utterance, self.min_confidence);
        if !synthesis.missing.is_empty() {
            log::info!("'{}' is missing {:?}", tool.name, synthesis.missing);
            return ExecutionResult::MissingParams(synthesis.missing);
        }
        if !synthesis.invalid.is_empty() {
            log::info!("'{}' has invalid {:?}", tool.name, synthesis.invalid);
            return ExecutionResult::InvalidParams(synthesis.invalid);
        }
        self.call(catalog, tool, &synthesis.arguments).await
    }

    /// Call a tool with ready arguments and classify the outcome
    pub async fn call(
        &self,
        catalog: &ToolCatalog,
        tool: &ToolDescriptor,
        args: &Map<String, Value>,
    ) -> ExecutionResult {
        let provider = match catalog.provider(&tool.owner) {
            Some(p) if p.is_enabled() => p,
            _ => {
                log::warn!("Provider '{}' for '{}' is not available", tool.owner, tool.name);
                return ExecutionResult::FallbackNeeded(format!("provider '{}' is not available", tool.owner));
            }
        };
        let timeout = provider.timeout();

        log::info!("Invoking '{}' on '{}'", tool.name, tool.owner);
        log::debug!("Arguments for '{}': {}", tool.name, Value::Object(args.clone()));

        let primary = match bounded(timeout, provider.call_tool(&tool.name, args)).await {
            Ok(value) => return ExecutionResult::Success(value),
            Err(e) => e,
        };
        if !primary.is_not_connected() {
            log::warn!("'{}' failed: {}", tool.name, primary);
            return ExecutionResult::ToolError(primary.to_string());
        }

        log::warn!("'{}' primary transport not connected, retrying built-in", tool.name);
        match bounded(timeout, provider.call_tool_builtin(&tool.name, args)).await {
            Ok(value) => ExecutionResult::Success(value),
            Err(e @ ProviderError::NoBuiltin(_)) => {
                ExecutionResult::FallbackNeeded(format!("{}; {}", primary, e))
            }
            Err(e) if e.is_not_connected() => ExecutionResult::FallbackNeeded(e.to_string()),
            Err(e) => {
                log::warn!("'{}' built-in transport failed: {}", tool.name, e);
                ExecutionResult::ToolError(e.to_string())
            }
        }
    }
}

/// Run a provider call under `timeout`, treating `{"error": ...}` payloads as failures
async fn bounded<F>(timeout: Duration, call: F) -> Result<Value, ProviderError>
where
    F: Future<Output = Result<Value, ProviderError>>,
{
    let value = tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;
    match payload_error(&value) {
        Some(message) => Err(ProviderError::Call(message)),
        None => Ok(value),
    }
}
