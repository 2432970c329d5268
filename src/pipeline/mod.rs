//! The request pipeline: extract, select, invoke, recover, render

pub mod candidate;
pub mod extractor;
pub mod fallback;
pub mod invoker;
pub mod orchestrator;
pub mod patterns;
pub mod render;
pub mod selector;

#[cfg(test)]
mod testing;

pub use candidate::{CandidateParameter, Provenance};
pub use extractor::{ContextExtractor, Extraction};
pub use fallback::{FallbackCoordinator, Recovery};
pub use invoker::{ExecutionResult, ToolInvoker};
pub use orchestrator::{NO_TOOL_MESSAGE, Orchestrator};
pub use render::{Locale, ResultRenderer, ToolCategory};
pub use selector::{ToolSelection, ToolSelector};
