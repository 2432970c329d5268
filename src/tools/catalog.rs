//! Tool catalog snapshots
//!
//! A `ToolCatalog` aggregates descriptors from every enabled provider and never changes
//! after construction. `CatalogHandle` holds the live snapshot; a rebuild publishes a new
//! `Arc` so in-flight requests keep the view they started with.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use super::definition::ToolDescriptor;
use super::provider::CapabilityProvider;

/// Immutable set of tools plus the providers that own them
#[derive(Clone, Default)]
pub struct ToolCatalog {
    version: u64,
    tools: Vec<ToolDescriptor>,
    providers: HashMap<String, Arc<dyn CapabilityProvider>>,
}

impl ToolCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider and aggregate its tools; disabled providers are skipped
    pub fn add_provider(&mut self, provider: Arc<dyn CapabilityProvider>) {
        if !provider.is_enabled() {
            log::info!("Provider '{}' is disabled, skipping its tools", provider.id());
            return;
        }
        let id = provider.id().to_string();
        let mut seen: HashSet<String> = HashSet::new();
        for mut tool in provider.tools() {
            if !seen.insert(tool.name.clone()) {
                log::warn!("Provider '{}' declares tool '{}' twice, keeping the first", id, tool.name);
                continue;
            }
            tool.owner = id.clone();
            self.tools.push(tool);
        }
        self.providers.insert(id, provider);
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// All tools in registration order
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Get a tool by name (first registered wins on cross-provider collisions)
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// List all tool names
    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Provider owning the given id
    pub fn provider(&self, owner: &str) -> Option<Arc<dyn CapabilityProvider>> {
        self.providers.get(owner).cloned()
    }

    /// Provider ids, sorted
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Tools owned by one provider
    pub fn by_owner(&self, owner: &str) -> Vec<&ToolDescriptor> {
        self.tools.iter().filter(|t| t.owner == owner).collect()
    }

    /// Every tool except the named one
    pub fn without(&self, name: &str) -> Vec<ToolDescriptor> {
        self.tools.iter().filter(|t| t.name != name).cloned().collect()
    }

    /// Union of parameter names declared by any tool
    pub fn known_params(&self) -> HashSet<&str> {
        self.tools
            .iter()
            .flat_map(|t| t.params.iter().map(|p| p.name.as_str()))
            .collect()
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("version", &self.version)
            .field("tools", &self.list())
            .field("providers", &self.provider_ids())
            .finish()
    }
}

/// Shared pointer to the current catalog snapshot
pub struct CatalogHandle {
    current: RwLock<Arc<ToolCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: ToolCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The snapshot to use for one request
    pub fn snapshot(&self) -> Arc<ToolCatalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the live snapshot; returns the new version
    pub fn publish(&self, mut catalog: ToolCatalog) -> u64 {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        catalog.version = guard.version + 1;
        let version = catalog.version;
        *guard = Arc::new(catalog);
        log::info!("Published tool catalog v{} ({} tools)", version, guard.len());
        version
    }
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::new(ToolCatalog::new())
    }
}
