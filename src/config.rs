//! Configuration for Toolpilot.
//!
//! Loaded from an explicit path, ~/.config/toolpilot/toolpilot.yml, or ./toolpilot.yml.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::Locale;
use crate::tools::ParamType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            providers: Vec::new(),
        }
    }
}

/// Oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    /// anthropic | openai | ollama | offline
    pub provider: String,
    pub model: String,
    /// Unset means the provider's own default endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key; unset means the provider's usual one.
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    /// Extra attempts after a transient oracle failure.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            api_key_env: None,
            max_tokens: 2048,
            timeout_ms: 60_000,
            max_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

/// Tunables for the orchestration pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Conversation turns handed to the extractor.
    pub history_window: usize,
    /// Candidates must score strictly above this to fill a slot.
    pub min_confidence: f64,
    /// Sequence items rendered before the "+N more" line.
    pub list_limit: usize,
    /// Leading utterance tokens used as a lookup query.
    pub lookup_query_tokens: usize,
    /// Cosmetic oracle pass over rendered output.
    pub polish: bool,
    pub locale: Locale,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_window: 2,
            min_confidence: 0.5,
            list_limit: 15,
            lookup_query_tokens: 3,
            polish: true,
            locale: Locale::En,
        }
    }
}

/// One capability provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfig {
    pub id: String,
    /// Registry key: http | command | static
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Secondary transport used when the primary reports "not connected".
    #[serde(default)]
    pub builtin_endpoint: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

/// Tool declaration inside a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamConfig>,
    /// Shell command (command providers).
    #[serde(default)]
    pub command: Option<String>,
    /// Canned result (static providers).
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParamConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Value used when the request supplies none, coerced to `type`.
    #[serde(default)]
    pub default: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ~/.config/toolpilot/toolpilot.yml
    /// 3. ./toolpilot.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        if !(0.0..1.0).contains(&p.min_confidence) {
            eyre::bail!("pipeline.min-confidence must be in [0, 1), got {}", p.min_confidence);
        }
        if p.list_limit == 0 {
            eyre::bail!("pipeline.list-limit must be > 0");
        }
        if p.history_window > 2 {
            eyre::bail!("pipeline.history-window must be at most 2, got {}", p.history_window);
        }

        let mut ids = HashSet::new();
        for provider in &self.providers {
            if !ids.insert(provider.id.as_str()) {
                eyre::bail!("duplicate provider id '{}'", provider.id);
            }
            let mut names = HashSet::new();
            for tool in &provider.tools {
                if !names.insert(tool.name.as_str()) {
                    eyre::bail!("duplicate tool '{}' in provider '{}'", tool.name, provider.id);
                }
            }
        }
        Ok(())
    }
}
