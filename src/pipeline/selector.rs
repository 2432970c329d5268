//! Tool selection
//!
//! Deterministic scoring first; the oracle only breaks ties or rescues a request nothing
//! scored for.

use std::sync::Arc;

use crate::llm::{LlmClient, extract_json_object, instruction};
use crate::tools::ToolDescriptor;

use super::candidate::CandidateParameter;
use super::patterns::{word_matches, words};

/// Utterance cues (Russian stems and English words) and the description words they imply
const KEYWORD_GROUPS: &[(&[&str], &[&str])] = &[
    (&["поиск", "найд", "найт", "ищи", "search", "find", "lookup"], &["search", "find", "lookup", "query"]),
    (&["созда", "добав", "create", "add", "new", "make"], &["create", "add", "new", "make"]),
    (&["обнов", "измен", "update", "edit", "change", "modify"], &["update", "modify", "edit", "change"]),
    (&["удал", "delete", "remove", "drop"], &["delete", "remove", "drop"]),
    (&["получ", "покаж", "показ", "get", "show", "fetch", "list"], &["get", "fetch", "retrieve", "show", "list"]),
    (&["пользовател", "user"], &["user", "person", "account"]),
    (&["проект", "задач", "project", "task", "issue"], &["project", "task", "issue"]),
    (&["файл", "file", "document"], &["file", "document", "attachment"]),
];

const CHOOSE_INSTRUCTION: &str = "Choose the single tool that best satisfies the user's request. \
Answer with ONLY a JSON object: {\"selected_tool\": \"<exact tool name>\", \"reason\": \"<short reason>\"}";

/// The tool chosen for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSelection {
    pub tool: ToolDescriptor,
    pub score: u32,
    pub reason: String,
}

/// `3 × required matched + all matched + description keyword match`
pub fn score(tool: &ToolDescriptor, utterance: &str, candidates: &[CandidateParameter]) -> u32 {
    let matched = |name: &str| candidates.iter().any(|c| c.is_valid() && c.maps_onto(name));
    let required = tool.required_params().filter(|p| matched(&p.name)).count() as u32;
    let all = tool.params.iter().filter(|p| matched(&p.name)).count() as u32;
    let keyword = u32::from(description_matches(utterance, &tool.description));
    3 * required + all + keyword
}

/// Whether the utterance carries a cue whose English words appear in the description
///
/// Both sides are compared word by word, so "address" never cues "add".
pub fn description_matches(utterance: &str, description: &str) -> bool {
    let tokens = words(utterance);
    let description = words(description);

    KEYWORD_GROUPS
        .iter()
        .any(|(cues, targets)| any_word_matches(&tokens, cues) && any_word_matches(&description, targets))
}

fn any_word_matches(list: &[String], stems: &[&str]) -> bool {
    list.iter().any(|w| stems.iter().any(|s| word_matches(w, s)))
}

pub struct ToolSelector {
    llm: Arc<dyn LlmClient>,
}

impl ToolSelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Pick one tool from the proposed set, or from `pool` when nothing was proposed
    pub async fn select(
        &self,
        utterance: &str,
        proposed: &[ToolDescriptor],
        candidates: &[CandidateParameter],
        pool: &[ToolDescriptor],
    ) -> Option<ToolSelection> {
        if let [only] = proposed {
            log::info!("Selected '{}' (sole proposal)", only.name);
            return Some(ToolSelection {
                tool: only.clone(),
                score: score(only, utterance, candidates),
                reason: "only tool proposed by extraction".to_string(),
            });
        }

        let searching_pool = proposed.is_empty();
        let field = if searching_pool { pool } else { proposed };
        if field.is_empty() {
            return None;
        }

        let scored: Vec<(u32, &ToolDescriptor)> = field.iter().map(|t| (score(t, utterance, candidates), t)).collect();
        for (s, t) in &scored {
            log::debug!("score {:>3} {}", s, t.name);
        }
        let best = scored.iter().map(|(s, _)| *s).max().unwrap_or(0);

        if searching_pool && best == 0 {
            log::info!("No tool scored above zero; asking the oracle over {} tools", field.len());
            let chosen = self.ask_oracle(utterance, field).await?;
            return Some(ToolSelection {
                tool: chosen.0.clone(),
                score: 0,
                reason: chosen.1,
            });
        }

        let tied: Vec<&ToolDescriptor> = scored.iter().filter(|(s, _)| *s == best).map(|(_, t)| *t).collect();
        let first = tied[0];
        if tied.len() == 1 {
            log::info!("Selected '{}' with score {}", first.name, best);
            return Some(ToolSelection {
                tool: first.clone(),
                score: best,
                reason: format!("highest score {}", best),
            });
        }

        let tied_tools: Vec<ToolDescriptor> = tied.iter().map(|t| (*t).clone()).collect();
        let selection = match self.ask_oracle(utterance, &tied_tools).await {
            Some((tool, reason)) => ToolSelection {
                tool: tool.clone(),
                score: best,
                reason,
            },
            None => ToolSelection {
                tool: first.clone(),
                score: best,
                reason: format!("tie at score {}, first candidate kept", best),
            },
        };
        log::info!("Selected '{}' from {} tied tools", selection.tool.name, tied.len());
        Some(selection)
    }

    /// Ask the oracle to name one of `tools`; None for errors and names outside the set
    async fn ask_oracle<'a>(
        &self,
        utterance: &str,
        tools: &'a [ToolDescriptor],
    ) -> Option<(&'a ToolDescriptor, String)> {
        let listing: Vec<String> = tools.iter().map(|t| format!("- {}: {}", t.name, t.description)).collect();
        let prompt = format!("Tools:\n{}\n\nUser request: {}", listing.join("\n"), utterance);

        let response = match self.llm.generate(&instruction(CHOOSE_INSTRUCTION, prompt)).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Selection oracle failed: {}", e);
                return None;
            }
        };

        let object = match extract_json_object(&response) {
            Ok(object) => object,
            Err(e) => {
                log::warn!("Unparsable selection response: {}", e);
                return None;
            }
        };

        let name = object
            .get("selected_tool")
            .or_else(|| object.get("tool"))
            .and_then(|v| v.as_str())?;
        match tools.iter().find(|t| t.name == name) {
            Some(tool) => {
                let reason = object
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("chosen by oracle")
                    .to_string();
                Some((tool, reason))
            }
            None => {
                log::warn!("Oracle chose '{}', which is not among the offered tools", name);
                None
            }
        }
    }
}
