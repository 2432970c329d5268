//! Tool system - descriptors, providers, and the catalog
//!
//! Providers register through `ProviderRegistry`; the resulting `ToolCatalog` is published
//! through a `CatalogHandle` and read as an immutable snapshot per request.

mod canned;
mod catalog;
mod command;
mod definition;
mod http;
mod provider;
mod registry;

pub use canned::CannedProvider;
pub use catalog::{CatalogHandle, ToolCatalog};
pub use command::CommandProvider;
pub use definition::{ParamSpec, ParamType, ToolDescriptor};
pub use http::HttpProvider;
pub use provider::{
    CapabilityProvider, DEFAULT_CALL_TIMEOUT, NOT_CONNECTED_MARKERS, ProviderError, is_not_connected, payload_error,
};
pub use registry::{ProviderFactory, ProviderRegistry};
