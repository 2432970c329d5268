//! Bounded recovery after a failed invocation
//!
//! Each failure class gets one retry at most: missing arguments are looked up through a
//! different tool, unavailable or broken tools are swapped for the next best one.

use serde_json::{Map, Value};

use crate::tools::{ToolCatalog, ToolDescriptor};

use super::candidate::{CandidateParameter, Provenance, is_meaningful, names_match, synonyms};
use super::invoker::{ExecutionResult, ToolInvoker};
use super::selector::ToolSelector;

/// Confidence for values taken from another tool's output
pub const LOOKUP_CONFIDENCE: f64 = 0.9;

/// Error text that makes a tool error worth a substitute attempt
pub const RECOVERABLE_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "not found",
    "unknown tool",
    "unsupported",
    "not supported",
    "not implemented",
    "не реализован",
    "connect",
    "unavailable",
];

/// Words in a tool's name or description that mark it as a lookup
const LOOKUP_WORDS: &[&str] = &["search", "find", "list", "lookup", "поиск"];

/// Container keys that commonly wrap result lists
const LIST_KEYS: &[&str] = &["data", "items", "results", "values"];

/// Identifying fields tried when the lookup tool lists the parameter's own kind of entity
const VALUE_FIELDS: &[&str] = &["key", "name", "id"];

/// Final outcome after recovery
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    Recovered { tool: ToolDescriptor, payload: Value },
    Failed(String),
}

/// Whether a tool error is worth trying another tool for
pub fn is_recoverable(message: &str) -> bool {
    let lower = message.to_lowercase();
    RECOVERABLE_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_lookup(tool: &ToolDescriptor) -> bool {
    let name = tool.name.to_lowercase();
    let description = tool.description.to_lowercase();
    LOOKUP_WORDS.iter().any(|w| name.contains(w) || description.contains(w))
}

/// The first `count` words of the utterance
pub fn lookup_query(utterance: &str, count: usize) -> String {
    utterance
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Entity words for a parameter: `project_key` -> project, `assignee` -> user, assignee
fn entity_words(param: &str) -> Vec<String> {
    let group = synonyms(param);
    let names: Vec<&str> = if group.is_empty() { vec![param] } else { group.to_vec() };
    let mut words: Vec<String> = names
        .iter()
        .filter_map(|n| n.split('_').next())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    words.dedup();
    words
}

/// Whether `source` lists the kind of entity `param` refers to
fn lists_entity(source: &ToolDescriptor, param: &str) -> bool {
    let name = source.name.to_lowercase();
    let description = source.description.to_lowercase();
    entity_words(param)
        .iter()
        .any(|w| name.contains(w.as_str()) || description.contains(w.as_str()))
}

/// Value for `param` from the first item of a lookup result returned by `source`
///
/// Fields named after the parameter (or a synonym) always qualify. Bare items and the
/// generic `key`/`name`/`id` fields only qualify when `source` lists that kind of entity.
pub fn first_item_value(result: &Value, param: &str, source: &ToolDescriptor) -> Option<String> {
    let first = match result {
        Value::Array(items) => items.first()?,
        Value::Object(map) => match LIST_KEYS.iter().find_map(|k| map.get(*k).and_then(Value::as_array)) {
            Some(items) => items.first()?,
            None => result,
        },
        other => other,
    };
    let same_entity = lists_entity(source, param);

    let text = match first {
        Value::String(_) | Value::Number(_) if same_entity => scalar_text(first)?,
        Value::Object(item) => {
            let named = std::iter::once(param).chain(synonyms(param).iter().copied());
            let generic = VALUE_FIELDS.iter().copied().filter(|_| same_entity);
            named
                .chain(generic)
                .filter_map(|f| item.get(f))
                .find_map(scalar_text)?
        }
        _ => return None,
    };
    is_meaningful(&text).then_some(text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct FallbackCoordinator<'a> {
    selector: &'a ToolSelector,
    invoker: &'a ToolInvoker,
    lookup_query_tokens: usize,
}

impl<'a> FallbackCoordinator<'a> {
    pub fn new(selector: &'a ToolSelector, invoker: &'a ToolInvoker, lookup_query_tokens: usize) -> Self {
        Self {
            selector,
            invoker,
            lookup_query_tokens: lookup_query_tokens.max(1),
        }
    }

    /// Recover from a non-success result, at most once per failure class
    pub async fn handle_failure(
        &self,
        catalog: &ToolCatalog,
        tool: &ToolDescriptor,
        result: ExecutionResult,
        candidates: &[CandidateParameter],
        utterance: &str,
    ) -> Recovery {
        match result {
            ExecutionResult::Success(payload) => Recovery::Recovered {
                tool: tool.clone(),
                payload,
            },
            ExecutionResult::MissingParams(names) | ExecutionResult::InvalidParams(names) => {
                self.recover_arguments(catalog, tool, &names, candidates, utterance).await
            }
            ExecutionResult::FallbackNeeded(reason) => {
                self.substitute(catalog, tool, &reason, candidates, utterance).await
            }
            ExecutionResult::ToolError(message) if is_recoverable(&message) => {
                self.substitute(catalog, tool, &message, candidates, utterance).await
            }
            ExecutionResult::ToolError(message) => Recovery::Failed(format!("Tool {} failed: {}", tool.name, message)),
        }
    }

    async fn recover_arguments(
        &self,
        catalog: &ToolCatalog,
        tool: &ToolDescriptor,
        names: &[String],
        candidates: &[CandidateParameter],
        utterance: &str,
    ) -> Recovery {
        let mut enriched = candidates.to_vec();
        let mut found = 0;
        for name in names {
            if let Some(value) = self.lookup(catalog, tool, name, utterance).await {
                log::info!("Recovered '{}' = '{}' from a lookup tool", name, value);
                enriched.push(CandidateParameter::new(
                    name.clone(),
                    value,
                    Provenance::PriorToolOutput,
                    LOOKUP_CONFIDENCE,
                ));
                found += 1;
            }
        }
        if found == 0 {
            return Recovery::Failed(unfilled_message(tool, names, false));
        }

        match self.invoker.invoke(catalog, tool, &enriched, utterance).await {
            ExecutionResult::Success(payload) => Recovery::Recovered {
                tool: tool.clone(),
                payload,
            },
            ExecutionResult::MissingParams(still) => Recovery::Failed(unfilled_message(tool, &still, false)),
            ExecutionResult::InvalidParams(still) => Recovery::Failed(unfilled_message(tool, &still, true)),
            other => Recovery::Failed(format!("Tool {} failed: {}", tool.name, other)),
        }
    }

    /// Query other lookup tools for a value of `name`; the first usable answer wins
    async fn lookup(
        &self,
        catalog: &ToolCatalog,
        failed: &ToolDescriptor,
        name: &str,
        utterance: &str,
    ) -> Option<String> {
        let query = lookup_query(utterance, self.lookup_query_tokens);

        for lookup in catalog.tools().iter().filter(|t| t.name != failed.name && is_lookup(t)) {
            let Some(args) = lookup_arguments(lookup, &query) else {
                log::debug!("Skipping lookup '{}': it needs arguments we cannot supply", lookup.name);
                continue;
            };
            log::info!("Looking up '{}' via '{}' with query '{}'", name, lookup.name, query);
            match self.invoker.call(catalog, lookup, &args).await {
                ExecutionResult::Success(result) => {
                    if let Some(value) = first_item_value(&result, name, lookup) {
                        return Some(value);
                    }
                }
                other => log::debug!("Lookup '{}' gave no value: {}", lookup.name, other),
            }
        }
        None
    }

    async fn substitute(
        &self,
        catalog: &ToolCatalog,
        failed: &ToolDescriptor,
        reason: &str,
        candidates: &[CandidateParameter],
        utterance: &str,
    ) -> Recovery {
        let first_failure = format!("Tool {} failed: {}", failed.name, reason);
        let pool = catalog.without(&failed.name);
        if pool.is_empty() {
            return Recovery::Failed(format!("{}. No alternative tool is available.", first_failure));
        }

        let Some(selection) = self.selector.select(utterance, &[], candidates, &pool).await else {
            return Recovery::Failed(format!("{}. No alternative tool was found.", first_failure));
        };
        log::info!("Substituting '{}' for '{}'", selection.tool.name, failed.name);

        match self.invoker.invoke(catalog, &selection.tool, candidates, utterance).await {
            ExecutionResult::Success(payload) => Recovery::Recovered {
                tool: selection.tool,
                payload,
            },
            other => Recovery::Failed(format!(
                "{}. Alternative tool {} also failed: {}",
                first_failure, selection.tool.name, other
            )),
        }
    }
}

/// Query argument for a lookup tool, or None when it needs more than a query
fn lookup_arguments(tool: &ToolDescriptor, query: &str) -> Option<Map<String, Value>> {
    let target = tool
        .params
        .iter()
        .find(|p| names_match(&p.name, "query"))
        .or_else(|| tool.required_params().next());

    if tool.required_params().any(|p| target.is_none_or(|t| t.name != p.name)) {
        return None;
    }

    let mut args = Map::new();
    if let Some(param) = target
        && !query.is_empty()
        && let Some(value) = param.param_type.coerce(query)
    {
        args.insert(param.name.clone(), value);
    }
    if target.is_some_and(|p| p.required) && args.is_empty() {
        return None;
    }
    Some(args)
}

fn unfilled_message(tool: &ToolDescriptor, names: &[String], invalid: bool) -> String {
    if invalid {
        format!("Tool {} received invalid values for: {}", tool.name, names.join(", "))
    } else {
        format!("Tool {} is missing required parameters: {}", tool.name, names.join(", "))
    }
}
