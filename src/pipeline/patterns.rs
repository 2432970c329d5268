//! Direct pattern matching over raw text
//!
//! Used when the oracle is unreachable or unparsable, to fill a required parameter the
//! oracle missed, and for directed inference of optional parameters.

use std::sync::LazyLock;

use regex::Regex;

use super::candidate::{CandidateParameter, Provenance, is_meaningful, synonyms};

/// Confidence of vocabulary matches
pub const PATTERN_CONFIDENCE: f64 = 0.8;

/// Confidence of directed inference for optional parameters
pub const INFERENCE_CONFIDENCE: f64 = 0.7;

/// Imperatives that must never be taken as argument values
pub const ACTION_VERBS: &[&str] = &[
    "создай",
    "найди",
    "покажи",
    "получи",
    "обнови",
    "удали",
    "добавь",
    "create",
    "find",
    "show",
    "get",
    "update",
    "delete",
    "add",
    "поиск",
    "список",
    "детали",
    "информация",
];

static PROJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:проект\w*|project\w*)[\s:]+([A-Z][A-Z0-9-]+)").expect("valid project regex"));
static TASK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:задач\w*|task\w*|issue\w*)[\s:]+([A-Z][A-Z0-9-]+)").expect("valid task regex"));
static USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:пользовател\w*|user)[\s:]+([a-zA-Z0-9_.-]+)").expect("valid user regex"));
static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:найди|найти|поиск|search)[\s:]+(\S+)").expect("valid keyword regex"));
static FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i:файл\w*|file)[\s:]+(\S+)").expect("valid file regex"));
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(/[^\s]+\.\w+)").expect("valid path regex"));
static COMMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([a-f0-9]{7,40})\b").expect("valid commit regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("valid email regex")
});
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(https?://[^\s'\x22]+)").expect("valid url regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bv?(\d+\.\d+(?:\.\d+)?)\b").expect("valid version regex"));
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("valid number regex"));

static DESC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:desc|descending|newest|latest)\b|убыва\w*|сначала нов\w*").expect("valid desc regex")
});
static ASC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:asc|ascending|oldest)\b|возраста\w*|сначала стар\w*").expect("valid asc regex")
});
static OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:open|opened)\b|открыт\w*").expect("valid open regex"));
static CLOSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:closed|resolved)\b|закрыт\w*").expect("valid closed regex"));

/// English inflections accepted after a Latin stem
const LATIN_SUFFIXES: &[&str] = &["", "s", "es", "d", "ed", "ing"];

/// Lowercase alphanumeric words of `text`
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether a lowercase word is `stem` or an inflection of it
///
/// Cyrillic stems match any word they prefix. Latin stems only take a short English
/// ending, so "add" matches "added" but not "address".
pub(crate) fn word_matches(word: &str, stem: &str) -> bool {
    let Some(rest) = word.strip_prefix(stem) else {
        return false;
    };
    !stem.is_ascii() || LATIN_SUFFIXES.contains(&rest)
}

/// Whether a captured value contains an action verb as a word of its own
pub fn is_action_verb(value: &str) -> bool {
    words(value)
        .iter()
        .any(|w| ACTION_VERBS.iter().any(|verb| word_matches(w, verb)))
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|v| is_meaningful(v) && !is_action_verb(v))
        .collect()
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    captures(re, text).into_iter().next()
}

/// Run the fixed vocabulary over `text`
pub fn vocabulary_matches(text: &str) -> Vec<CandidateParameter> {
    let vocabulary: [(&str, &Regex); 10] = [
        ("project_id", &*PROJECT_RE),
        ("task_id", &*TASK_RE),
        ("commit_hash", &*COMMIT_RE),
        ("file_path", &*PATH_RE),
        ("username", &*USER_RE),
        ("keyword", &*KEYWORD_RE),
        ("email", &*EMAIL_RE),
        ("url", &*URL_RE),
        ("version", &*VERSION_RE),
        ("number", &*NUMBER_RE),
    ];

    vocabulary
        .iter()
        .flat_map(|(name, re)| {
            captures(re, text)
                .into_iter()
                .map(move |value| CandidateParameter::new(*name, value, Provenance::PatternMatch, PATTERN_CONFIDENCE))
        })
        .collect()
}

/// Targeted extraction of one parameter from the utterance
///
/// Only parameters in the project, task, user, keyword, and file families have a pattern.
pub fn extract_for_param(param: &str, utterance: &str) -> Option<String> {
    let group = synonyms(param);
    let family = group.first().copied().unwrap_or(param);
    match family {
        "project" => first_capture(&PROJECT_RE, utterance),
        "task" => first_capture(&TASK_RE, utterance),
        "user" => first_capture(&USER_RE, utterance),
        "query" => first_capture(&KEYWORD_RE, utterance),
        "path" => first_capture(&FILE_RE, utterance).or_else(|| first_capture(&PATH_RE, utterance)),
        _ => None,
    }
}

/// Keyword and numeric heuristics for an optional parameter
pub fn infer_optional(param: &str, context: &str) -> Option<String> {
    let name = param.to_lowercase();
    if name.contains("limit") || name.contains("count") {
        return first_capture(&NUMBER_RE, context);
    }
    if name.contains("sort") || name.contains("order") {
        if DESC_RE.is_match(context) {
            return Some("desc".to_string());
        }
        if ASC_RE.is_match(context) {
            return Some("asc".to_string());
        }
        return None;
    }
    if name.contains("state") || name.contains("status") {
        if CLOSED_RE.is_match(context) {
            return Some("closed".to_string());
        }
        if OPEN_RE.is_match(context) {
            return Some("opened".to_string());
        }
    }
    None
}
