//! Toolpilot - natural-language tool orchestration
//!
//! Turns a free-form request into one call against a catalog of remote tools: candidate
//! parameters are extracted, a tool is selected and invoked, failures get one bounded recovery
//! attempt, and the structured result is rendered as text.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod tools;

pub use error::{Result, ToolpilotError};
