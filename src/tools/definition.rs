//! Tool descriptors and parameter schemas
//!
//! A descriptor is immutable once built. Parameters keep declaration order.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ToolConfig;
use crate::error::ToolpilotError;

/// Declared type of a tool parameter
///
/// Deserializes through [`FromStr`], so configs may use aliases like `int` or `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FromStr for ParamType {
    type Err = ToolpilotError;

    /// Parse a JSON-schema style type name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "number" | "float" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "array" | "list" => Ok(Self::Array),
            "object" | "dict" => Ok(Self::Object),
            other => Err(ToolpilotError::Config(format!("unknown parameter type '{}'", other))),
        }
    }
}

impl TryFrom<String> for ParamType {
    type Error = ToolpilotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Convert a textual candidate value into a typed JSON value.
    ///
    /// Returns None when the text cannot represent this type.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Self::Boolean => match raw.to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "да" => Some(Value::Bool(true)),
                "false" | "no" | "n" | "0" | "нет" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Array => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Array(_)) => Some(v),
                _ => {
                    let items: Vec<Value> = raw
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| Value::String(s.to_string()))
                        .collect();
                    (!items.is_empty()).then_some(Value::Array(items))
                }
            },
            Self::Object => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Object(_)) => Some(v),
                _ => None,
            },
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Used when nothing in the request supplies a value
    #[serde(default)]
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type,
            required,
            description: None,
            default: None,
        }
    }

    /// The default coerced to the declared type
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_deref().and_then(|d| self.param_type.coerce(d))
    }
}

/// A tool as registered by its owning provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique within the owning provider
    pub name: String,
    /// Free text used for scoring and oracle prompts
    pub description: String,
    /// Owning provider id
    pub owner: String,
    /// Parameters in declaration order
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// Create a descriptor with no parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            owner: owner.into(),
            params: Vec::new(),
        }
    }

    /// Declare a required parameter
    pub fn with_required(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(ParamSpec::new(name, param_type, true));
        self
    }

    /// Declare an optional parameter
    pub fn with_optional(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(ParamSpec::new(name, param_type, false));
        self
    }

    /// Give the most recently declared parameter a provider-side default
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        if let Some(param) = self.params.last_mut() {
            param.default = Some(value.into());
        }
        self
    }

    /// Build from a provider's tool configuration
    pub fn from_config(owner: &str, config: &ToolConfig) -> Self {
        let params = config
            .params
            .iter()
            .map(|p| ParamSpec {
                name: p.name.clone(),
                param_type: p.param_type,
                required: p.required,
                description: p.description.clone(),
                default: p.default.clone(),
            })
            .collect();

        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            owner: owner.to_string(),
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn optional_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| !p.required)
    }

    /// One-line parameter summary, e.g. `summary: string (required), description: string`
    pub fn param_summary(&self) -> String {
        if self.params.is_empty() {
            return "no parameters".to_string();
        }
        self.params
            .iter()
            .map(|p| {
                if p.required {
                    format!("{}: {} (required)", p.name, p.param_type.as_str())
                } else {
                    format!("{}: {}", p.name, p.param_type.as_str())
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
