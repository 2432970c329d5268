//! Candidate parameters and the synonym table

use serde::{Deserialize, Serialize};

/// Tokens that mean "no value" when an oracle or pattern produces them
pub const NO_VALUE_TOKENS: &[&str] = &["", "null", "none"];

/// Parameter names that refer to the same thing across providers
pub const SYNONYM_GROUPS: &[&[&str]] = &[
    &["project", "project_id", "project_key"],
    &["task", "task_id", "issue", "issue_id", "issue_key"],
    &["user", "username", "assignee"],
    &["query", "search", "keyword"],
    &["path", "file_path", "file"],
    &["commit", "hash", "commit_id", "commit_hash"],
];

/// Where a candidate value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    OracleExtraction,
    PatternMatch,
    ContextInference,
    PriorToolOutput,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::OracleExtraction => "oracle-extraction",
            Provenance::PatternMatch => "pattern-match",
            Provenance::ContextInference => "context-inference",
            Provenance::PriorToolOutput => "prior-tool-output",
        }
    }
}

/// A tentative value for a tool argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateParameter {
    pub name: String,
    pub value: String,
    pub provenance: Provenance,
    pub confidence: f64,
}

impl CandidateParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>, provenance: Provenance, confidence: f64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            provenance,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// False for empty values and the "no value" tokens
    pub fn is_valid(&self) -> bool {
        is_meaningful(&self.value)
    }

    /// Whether this candidate can fill the named parameter
    pub fn maps_onto(&self, param: &str) -> bool {
        names_match(&self.name, param)
    }
}

/// Check that a value is not empty or a "no value" token
pub fn is_meaningful(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !NO_VALUE_TOKENS.contains(&value.as_str())
}

/// Synonym group containing `name`, if any
pub fn synonyms(name: &str) -> &'static [&'static str] {
    let name = name.to_lowercase();
    SYNONYM_GROUPS
        .iter()
        .find(|group| group.contains(&name.as_str()))
        .copied()
        .unwrap_or(&[])
}

/// Names are interchangeable when equal or in one synonym group
pub fn names_match(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let b = b.to_lowercase();
    synonyms(a).contains(&b.as_str())
}

/// Drop invalid candidates
pub fn retain_valid(candidates: &mut Vec<CandidateParameter>) {
    candidates.retain(|c| {
        let valid = c.is_valid();
        if !valid {
            log::debug!("Discarding empty candidate '{}' ({})", c.name, c.provenance.as_str());
        }
        valid
    });
}

/// Valid candidates that can fill `param` with confidence above `min_confidence`,
/// best first. Ties keep their original order.
pub fn ranked_for<'a>(
    candidates: &'a [CandidateParameter],
    param: &str,
    min_confidence: f64,
) -> Vec<&'a CandidateParameter> {
    let mut ranked: Vec<&CandidateParameter> = candidates
        .iter()
        .filter(|c| c.is_valid() && c.confidence > min_confidence && c.maps_onto(param))
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, value: &str, confidence: f64) -> CandidateParameter {
        CandidateParameter::new(name, value, Provenance::OracleExtraction, confidence)
    }

    #[test]
    fn test_validity() {
        assert!(candidate("summary", "Тестовая задача", 0.9).is_valid());
        assert!(!candidate("summary", "", 0.9).is_valid());
        assert!(!candidate("summary", "  NULL ", 0.9).is_valid());
        assert!(!candidate("summary", "None", 0.9).is_valid());
        assert!(candidate("summary", "nonempty", 0.9).is_valid());
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(candidate("a", "b", 1.7).confidence, 1.0);
        assert_eq!(candidate("a", "b", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_names_match() {
        assert!(names_match("project", "project_key"));
        assert!(names_match("project_id", "project"));
        assert!(names_match("Summary", "summary"));
        assert!(names_match("issue", "task_id"));
        assert!(names_match("keyword", "query"));
        assert!(!names_match("project", "issue_key"));
        assert!(!names_match("summary", "description"));
    }

    #[test]
    fn test_synonyms() {
        assert_eq!(synonyms("hash"), &["commit", "hash", "commit_id", "commit_hash"]);
        assert!(synonyms("summary").is_empty());
    }

    #[test]
    fn test_ranked_for() {
        let candidates = vec![
            candidate("project", "LOW", 0.6),
            candidate("project_key", "HIGH", 0.95),
            candidate("project_id", "null", 0.99),
            candidate("project", "WEAK", 0.5),
            candidate("summary", "x", 0.99),
        ];
        let ranked = ranked_for(&candidates, "project_key", 0.5);
        let values: Vec<&str> = ranked.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["HIGH", "LOW"]);
    }

    #[test]
    fn test_retain_valid() {
        let mut candidates = vec![candidate("a", "x", 0.9), candidate("b", " ", 0.9)];
        retain_valid(&mut candidates);
        assert_eq!(candidates.len(), 1);
    }
}
