//! Best-effort recovery of a JSON object from oracle prose
//!
//! Models wrap JSON in code fences, preambles, and trailing chatter. Recovery tries the
//! widest `{ ... }` slice first (first `{` through last `}`), then each balanced
//! `{ ... }` span in order. Callers fall back to pattern matching on failure.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why no JSON object could be recovered
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("no JSON object found in response")]
    NoObject,

    #[error("malformed JSON object: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Recover the first JSON object embedded in `text`
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, RecoveryError> {
    let start = text.find('{').ok_or(RecoveryError::NoObject)?;
    let end = text.rfind('}').ok_or(RecoveryError::NoObject)?;
    if end < start {
        return Err(RecoveryError::NoObject);
    }

    let widest = match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(_) => None,
        Err(e) => Some(e),
    };

    let mut offset = start;
    while let Some(span) = balanced_span(&text[offset..]) {
        let (s, e) = (offset + span.0, offset + span.1);
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[s..=e]) {
            return Ok(map);
        }
        offset = s + 1;
        match text[offset..].find('{') {
            Some(next) => offset += next,
            None => break,
        }
    }

    match widest {
        Some(e) => Err(RecoveryError::Malformed(e)),
        None => Err(RecoveryError::NoObject),
    }
}

/// Byte range (inclusive) of the first balanced `{ ... }` span, honoring string literals
fn balanced_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + i));
                }
            }
            _ => {}
        }
    }
    None
}
