//! Provider registration table
//!
//! Maps a provider kind to a factory. Populated at startup; adding a provider kind never
//! touches the orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::{Result, ToolpilotError};

use super::canned::CannedProvider;
use super::catalog::ToolCatalog;
use super::command::CommandProvider;
use super::http::HttpProvider;
use super::provider::CapabilityProvider;

/// Builds one provider instance from its configuration
pub type ProviderFactory = fn(&ProviderConfig) -> Result<Arc<dyn CapabilityProvider>>;

/// Table of provider kinds
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the kinds shipped in this crate: http, command, static
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register("http", HttpProvider::create);
        registry.register("command", CommandProvider::create);
        registry.register("static", CannedProvider::create);
        registry
    }

    /// Register (or replace) a provider kind
    pub fn register(&mut self, kind: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(kind.into().to_lowercase(), factory);
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Instantiate one provider
    pub fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn CapabilityProvider>> {
        let factory = self.factories.get(&config.kind.to_lowercase()).ok_or_else(|| {
            ToolpilotError::Catalog(format!(
                "unknown provider kind '{}' for provider '{}'",
                config.kind, config.id
            ))
        })?;
        factory(config)
    }

    /// Build a catalog from provider configurations
    ///
    /// Disabled providers are skipped. A provider whose factory fails is logged and
    /// skipped; an unknown kind is a configuration error.
    pub fn build_catalog(&self, configs: &[ProviderConfig]) -> Result<ToolCatalog> {
        let mut catalog = ToolCatalog::new();
        for config in configs {
            if !config.enabled {
                log::info!("Provider '{}' disabled in config", config.id);
                continue;
            }
            match self.create(config) {
                Ok(provider) => {
                    log::debug!("Registered provider '{}' ({})", config.id, config.kind);
                    catalog.add_provider(provider);
                }
                Err(e @ ToolpilotError::Catalog(_)) => return Err(e),
                Err(e) => log::warn!("Failed to initialize provider '{}': {}", config.id, e),
            }
        }
        log::info!(
            "Catalog built: {} tools from {} providers",
            catalog.len(),
            catalog.provider_ids().len()
        );
        Ok(catalog)
    }
}
