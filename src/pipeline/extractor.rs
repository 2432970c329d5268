//! Context parameter extraction
//!
//! Mines the utterance, the last few conversation turns, and the user's notes for
//! candidate arguments. The oracle does the heavy lifting; pattern matching covers for
//! it when its answer is missing or unreadable.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::llm::{LlmClient, extract_json_object, instruction};
use crate::session::ConversationTurn;
use crate::tools::{ToolCatalog, ToolDescriptor};

use super::candidate::{CandidateParameter, Provenance, ranked_for, retain_valid};
use super::patterns::{INFERENCE_CONFIDENCE, infer_optional, vocabulary_matches};

/// Confidence for oracle-extracted values of required parameters
pub const REQUIRED_CONFIDENCE: f64 = 0.95;

/// Confidence for oracle-extracted values of optional parameters
pub const OPTIONAL_CONFIDENCE: f64 = 0.85;

/// Most conversation turns ever handed to the oracle
pub const MAX_HISTORY_TURNS: usize = 2;

const EXTRACTION_INSTRUCTION: &str = "You extract tool parameters from a user's request. \
Use the exact tool and parameter names listed. Return ONLY a JSON object, no prose, in one of two shapes:\n\
{\"parameters\": {\"<parameter>\": \"<value>\"}, \"found_tools\": [\"<tool>\"]}\n\
{\"<tool>\": {\"<parameter>\": \"<value>\"}, \"found_tools\": [\"<tool>\"]}\n\
Only include parameters whose values are stated or clearly implied. The current request takes priority over history and notes.";

/// Candidates plus the tools the oracle named
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub candidates: Vec<CandidateParameter>,
    pub tools: Vec<ToolDescriptor>,
}

pub struct ContextExtractor {
    llm: Arc<dyn LlmClient>,
    history_window: usize,
}

impl ContextExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, history_window: usize) -> Self {
        Self {
            llm,
            history_window: history_window.min(MAX_HISTORY_TURNS),
        }
    }

    /// Produce candidate parameters and suggested tools for one request
    pub async fn extract(
        &self,
        utterance: &str,
        turns: &[ConversationTurn],
        notes: Option<&str>,
        catalog: &ToolCatalog,
    ) -> Extraction {
        let window = self.build_context(utterance, turns, notes);
        let prompt = format!("{}\n\n{}", describe_catalog(catalog), window.prompt);

        let response = match self.llm.generate(&instruction(EXTRACTION_INSTRUCTION, prompt)).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Extraction oracle unavailable ({}), falling back to patterns", e);
                return pattern_fallback(&window.raw);
            }
        };
        log::debug!("Extraction oracle response: {}", response);

        let object = match extract_json_object(&response) {
            Ok(object) => object,
            Err(e) => {
                log::warn!("Unparsable extraction response ({}), falling back to patterns", e);
                return pattern_fallback(&window.raw);
            }
        };

        let mut extraction = interpret(&object, catalog);
        infer_missing_optionals(&mut extraction, &window.raw);
        retain_valid(&mut extraction.candidates);

        log::info!(
            "Extracted {} candidates, {} suggested tools",
            extraction.candidates.len(),
            extraction.tools.len()
        );
        extraction
    }

    /// Current utterance first, then the recent turns, then the notes
    fn build_context(&self, utterance: &str, turns: &[ConversationTurn], notes: Option<&str>) -> ContextWindow {
        let utterance = utterance.trim();
        let mut prompt = format!("Current request: {}", utterance);
        let mut raw = utterance.to_string();

        let skip = turns.len().saturating_sub(self.history_window);
        let recent = &turns[skip..];
        if !recent.is_empty() {
            prompt.push_str("\n\nRecent conversation:");
            for turn in recent {
                prompt.push_str(&format!("\n{}: {}", turn.role.as_str(), turn.content));
                raw.push('\n');
                raw.push_str(&turn.content);
            }
        }

        if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
            prompt.push_str(&format!("\n\nUser notes: {}", notes));
            raw.push('\n');
            raw.push_str(notes);
        }
        ContextWindow { prompt, raw }
    }
}

/// Labeled text for the oracle, and the same text without labels for pattern matching
struct ContextWindow {
    prompt: String,
    raw: String,
}

/// Catalog listing with every parameter of every tool
fn describe_catalog(catalog: &ToolCatalog) -> String {
    let mut out = String::from("Available tools:");
    for tool in catalog.tools() {
        out.push_str(&format!("\n- {}: {}\n  parameters: {}", tool.name, tool.description, tool.param_summary()));
    }
    out
}

fn pattern_fallback(context: &str) -> Extraction {
    let mut candidates = vocabulary_matches(context);
    retain_valid(&mut candidates);
    log::info!("Pattern fallback produced {} candidates", candidates.len());
    Extraction {
        candidates,
        tools: Vec::new(),
    }
}

/// Text form of an oracle value; strings are taken verbatim
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Read either response shape
///
/// A key that names a catalog tool and holds an object is a nested parameter map for that
/// tool; any other key is a flat parameter. This holds both at the top level and inside
/// `parameters`.
fn interpret(object: &Map<String, Value>, catalog: &ToolCatalog) -> Extraction {
    let known = catalog.known_params();
    let mut extraction = Extraction::default();
    let mut named: Vec<String> = Vec::new();

    let mut entries: Vec<(&String, &Value)> = Vec::new();
    for (key, value) in object {
        match (key.as_str(), value) {
            ("found_tools", Value::Array(items)) => {
                named.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            ("found_tools", _) => {}
            ("parameters", Value::Object(params)) => entries.extend(params.iter()),
            _ => entries.push((key, value)),
        }
    }

    for (key, value) in entries {
        if let (Some(tool), Value::Object(params)) = (catalog.get(key), value) {
            named.push(tool.name.clone());
            for (name, value) in params {
                match tool.param(name) {
                    Some(spec) => extraction.candidates.push(oracle_candidate(name, value, spec.required)),
                    None => log::warn!("Discarding unknown parameter '{}' for tool '{}'", name, tool.name),
                }
            }
            continue;
        }

        if !known.contains(key.as_str()) {
            log::warn!("Discarding unknown parameter '{}'", key);
            continue;
        }
        let required = catalog
            .tools()
            .iter()
            .any(|t| t.param(key).is_some_and(|p| p.required));
        extraction.candidates.push(oracle_candidate(key, value, required));
    }

    let mut seen = HashSet::new();
    for name in named {
        if !seen.insert(name.clone()) {
            continue;
        }
        match catalog.get(&name) {
            Some(tool) => extraction.tools.push(tool.clone()),
            None => log::debug!("Oracle named unknown tool '{}', skipping", name),
        }
    }
    extraction
}

fn oracle_candidate(name: &str, value: &Value, required: bool) -> CandidateParameter {
    let confidence = if required { REQUIRED_CONFIDENCE } else { OPTIONAL_CONFIDENCE };
    CandidateParameter::new(name, value_text(value), Provenance::OracleExtraction, confidence)
}

/// Directed inference for optional parameters the oracle left out
fn infer_missing_optionals(extraction: &mut Extraction, context: &str) {
    let mut inferred = Vec::new();
    for tool in &extraction.tools {
        for param in tool.optional_params() {
            if !ranked_for(&extraction.candidates, &param.name, 0.0).is_empty() {
                continue;
            }
            if let Some(value) = infer_optional(&param.name, context) {
                log::debug!("Inferred {}={} for tool '{}'", param.name, value, tool.name);
                inferred.push(CandidateParameter::new(
                    param.name.clone(),
                    value,
                    Provenance::ContextInference,
                    INFERENCE_CONFIDENCE,
                ));
            }
        }
    }
    extraction.candidates.extend(inferred);
}
