//! Result rendering
//!
//! Structural rendering is pure: the same value always yields the same text. The optional
//! oracle pass is cosmetic and falls back to the structural text on any failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::{LlmClient, instruction};

/// Keys printed first, in this order, when rendering an object
pub const PRIORITY_KEYS: &[&str] = &[
    "id",
    "name",
    "title",
    "key",
    "status",
    "description",
    "url",
    "summary",
    "state",
    "author",
    "assignee",
    "created_at",
    "updated_at",
];

/// Most fields shown when summarizing one list item
const SUMMARY_FIELDS: usize = 4;

const POLISH_INSTRUCTION: &str = "Reformat the following tool output for readability. \
Do not add commentary, do not add or remove facts, and keep the language of the text. \
Reply with the reformatted text only.";

/// Output language for fixed words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl Locale {
    fn yes(&self) -> &'static str {
        match self {
            Locale::En => "yes",
            Locale::Ru => "да",
        }
    }

    fn no(&self) -> &'static str {
        match self {
            Locale::En => "no",
            Locale::Ru => "нет",
        }
    }

    fn empty(&self) -> &'static str {
        match self {
            Locale::En => "empty",
            Locale::Ru => "пусто",
        }
    }

    fn more(&self, n: usize) -> String {
        match self {
            Locale::En => format!("+{} more", n),
            Locale::Ru => format!("+{} ещё", n),
        }
    }

    fn items(&self, n: usize) -> String {
        match self {
            Locale::En => format!("[{} items]", n),
            Locale::Ru => format!("[элементов: {}]", n),
        }
    }

    fn header(&self, tool: &str, service: &str) -> String {
        match (self, service.is_empty()) {
            (Locale::En, true) => format!("Result of {}:", tool),
            (Locale::En, false) => format!("Result of {} ({}):", tool, service),
            (Locale::Ru, true) => format!("Результат {}:", tool),
            (Locale::Ru, false) => format!("Результат {} ({}):", tool, service),
        }
    }
}

/// Keys that name a nested object well enough to stand for it on one line
const IDENTITY_KEYS: &[&str] = &["name", "title", "key", "username", "id"];

/// Semantic category of a tool, inferred from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Project,
    Commit,
    Issue,
    User,
    Page,
    Branch,
    Search,
    Generic,
}

impl ToolCategory {
    pub fn from_tool_name(name: &str) -> Self {
        let name = name.to_lowercase();
        let rules: [(&[&str], ToolCategory); 7] = [
            (&["project"], ToolCategory::Project),
            (&["commit"], ToolCategory::Commit),
            (&["issue", "task"], ToolCategory::Issue),
            (&["user", "member"], ToolCategory::User),
            (&["page", "wiki"], ToolCategory::Page),
            (&["branch"], ToolCategory::Branch),
            (&["search", "find"], ToolCategory::Search),
        ];
        rules
            .iter()
            .find(|(words, _)| words.iter().any(|w| name.contains(w)))
            .map(|(_, category)| *category)
            .unwrap_or(ToolCategory::Generic)
    }

    /// Fields that summarize one item of this category, most telling first
    pub fn summary_fields(&self) -> &'static [&'static str] {
        match self {
            ToolCategory::Project => &["key", "name", "path_with_namespace", "id", "description"],
            ToolCategory::Commit => &["short_id", "id", "title", "message", "author_name", "author", "created_at"],
            ToolCategory::Issue => &["key", "iid", "id", "summary", "title", "status", "state", "assignee"],
            ToolCategory::User => &["username", "name", "display_name", "email", "id"],
            ToolCategory::Page => &["title", "id", "space", "url"],
            ToolCategory::Branch => &["name", "commit", "protected", "default"],
            ToolCategory::Search => &["title", "name", "key", "id", "url", "summary"],
            ToolCategory::Generic => &["id", "name", "title", "key", "status", "description"],
        }
    }
}

pub struct ResultRenderer {
    locale: Locale,
    list_limit: usize,
}

impl ResultRenderer {
    pub fn new(locale: Locale, list_limit: usize) -> Self {
        Self {
            locale,
            list_limit: list_limit.max(1),
        }
    }

    /// Header line plus the structural body
    pub fn render(&self, value: &Value, tool_name: &str, service: &str) -> String {
        format!("{}\n{}", self.locale.header(tool_name, service), self.render_value(value, tool_name))
    }

    /// Structural text for `value` alone
    pub fn render_value(&self, value: &Value, tool_name: &str) -> String {
        let category = ToolCategory::from_tool_name(tool_name);
        let mut lines = Vec::new();
        self.write(&mut lines, value, 0, category);
        lines.join("\n")
    }

    /// One cosmetic oracle pass; the input comes back unchanged on failure
    pub async fn polish(&self, llm: &dyn LlmClient, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        match llm.generate(&instruction(POLISH_INSTRUCTION, text)).await {
            Ok(polished) if !polished.trim().is_empty() => polished.trim().to_string(),
            Ok(_) => {
                log::debug!("Polish pass returned nothing, keeping structural text");
                text.to_string()
            }
            Err(e) => {
                log::debug!("Polish pass failed ({}), keeping structural text", e);
                text.to_string()
            }
        }
    }

    fn write(&self, lines: &mut Vec<String>, value: &Value, depth: usize, category: ToolCategory) {
        let pad = "  ".repeat(depth);
        match value {
            Value::Array(items) if items.is_empty() => lines.push(format!("{}{}", pad, self.locale.empty())),
            Value::Array(items) => self.write_list(lines, items, depth, category),
            Value::Object(map) if map.is_empty() => lines.push(format!("{}{}", pad, self.locale.empty())),
            Value::Object(map) => self.write_object(lines, map, depth, category),
            scalar => lines.push(format!("{}{}", pad, self.scalar(scalar))),
        }
    }

    fn write_list(&self, lines: &mut Vec<String>, items: &[Value], depth: usize, category: ToolCategory) {
        let pad = "  ".repeat(depth);
        for (i, item) in items.iter().take(self.list_limit).enumerate() {
            match item {
                Value::Array(inner) if !inner.is_empty() => {
                    lines.push(format!("{}{}.", pad, i + 1));
                    self.write(lines, item, depth + 1, category);
                }
                _ => lines.push(format!("{}{}. {}", pad, i + 1, self.summarize(item, category))),
            }
        }
        if items.len() > self.list_limit {
            lines.push(format!("{}{}", pad, self.locale.more(items.len() - self.list_limit)));
        }
    }

    fn write_object(&self, lines: &mut Vec<String>, map: &Map<String, Value>, depth: usize, category: ToolCategory) {
        let pad = "  ".repeat(depth);
        for key in ordered_keys(map) {
            let value = &map[key.as_str()];
            match value {
                Value::Array(items) if !items.is_empty() => {
                    lines.push(format!("{}{}:", pad, key));
                    self.write(lines, value, depth + 1, category);
                }
                Value::Object(inner) if !inner.is_empty() => {
                    lines.push(format!("{}{}:", pad, key));
                    self.write(lines, value, depth + 1, category);
                }
                _ => lines.push(format!("{}{}: {}", pad, key, self.inline(value))),
            }
        }
    }

    /// One-line form of a list item
    fn summarize(&self, item: &Value, category: ToolCategory) -> String {
        let Value::Object(map) = item else {
            return self.inline(item);
        };
        if map.is_empty() {
            return self.locale.empty().to_string();
        }

        let parts: Vec<String> = category
            .summary_fields()
            .iter()
            .filter_map(|field| map.get(*field).filter(|v| !v.is_null()).map(|v| self.inline(v)))
            .take(SUMMARY_FIELDS)
            .collect();
        if !parts.is_empty() {
            return parts.join(" | ");
        }

        // nothing category-specific: fall back to the generic key order
        self.key_values(map)
    }

    /// First few `key: value` pairs in key order
    fn key_values(&self, map: &Map<String, Value>) -> String {
        ordered_keys(map)
            .into_iter()
            .take(SUMMARY_FIELDS)
            .map(|key| format!("{}: {}", key, self.inline(&map[key.as_str()])))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn inline(&self, value: &Value) -> String {
        match value {
            Value::Array(items) if items.is_empty() => self.locale.empty().to_string(),
            Value::Array(items) => self.locale.items(items.len()),
            Value::Object(map) if map.is_empty() => self.locale.empty().to_string(),
            Value::Object(map) => IDENTITY_KEYS
                .iter()
                .find_map(|k| map.get(*k).filter(|v| !v.is_object() && !v.is_array() && !v.is_null()))
                .map(|v| self.scalar(v))
                .unwrap_or_else(|| self.key_values(map)),
            scalar => self.scalar(scalar),
        }
    }

    fn scalar(&self, value: &Value) -> String {
        match value {
            Value::Null => self.locale.empty().to_string(),
            Value::Bool(true) => self.locale.yes().to_string(),
            Value::Bool(false) => self.locale.no().to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Priority keys in fixed order, then the rest alphabetically
fn ordered_keys(map: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = PRIORITY_KEYS
        .iter()
        .filter(|k| map.contains_key(**k))
        .map(|k| k.to_string())
        .collect();
    let mut rest: Vec<String> = map
        .keys()
        .filter(|k| !PRIORITY_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    rest.sort();
    keys.extend(rest);
    keys
}
