//! JSON object extraction from LLM responses.
//!
//! Models asked for JSON often wrap it in markdown fences or surround it with
//! prose. Extraction tries, in order:
//! 1. A ```json fenced block
//! 2. Any fenced block containing an object
//! 3. The whole response, when it starts with `{`
//! 4. The first balanced object anywhere in the response
//!
//! Each candidate must parse as a JSON object. When none does but an object
//! was opened and never closed, the response is reported as truncated so the
//! caller can tell a cut-off completion from one that contained no JSON.
//!
//! # Example
//!
//! ```
//! use qa_forge::utils::json_extraction::extract_json_object;
//!
//! let response = "Here is the config:\n```json\n{\"use_planner\": true}\n```";
//! let json = extract_json_object(response).unwrap();
//! assert_eq!(json, "{\"use_planner\": true}");
//! ```

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const PREVIEW_CHARS: usize = 80;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated ({unclosed_braces} unclosed braces): {preview}...")]
    Truncated {
        preview: String,
        unclosed_braces: usize,
    },

    #[error("No JSON object found in response starting with '{preview}'")]
    NotFound { preview: String },
}

/// Extracts the first JSON object from an LLM response.
///
/// # Errors
///
/// Returns [`JsonExtractionError::Truncated`] when an object starts but never
/// closes, and [`JsonExtractionError::NotFound`] otherwise.
pub fn extract_json_object(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    let candidates = [
        extract_from_json_code_block(trimmed),
        extract_from_generic_code_block(trimmed),
        trimmed
            .starts_with('{')
            .then(|| balanced_object(trimmed))
            .flatten(),
        first_balanced_object(trimmed),
    ];

    if let Some(json) = candidates.into_iter().flatten().find(|c| is_json_object(c)) {
        return Ok(json);
    }

    if let Some(start) = trimmed.find('{') {
        let unclosed_braces = count_unclosed_braces(&trimmed[start..]);
        if unclosed_braces > 0 {
            return Err(JsonExtractionError::Truncated {
                preview: preview(&trimmed[start..]),
                unclosed_braces,
            });
        }
    }

    Err(JsonExtractionError::NotFound {
        preview: preview(trimmed),
    })
}

/// Index of the `}` closing the object that `s` starts with.
///
/// Braces inside string literals, including escaped quotes, are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Contents of the first ```json fenced block, if it holds an object.
pub fn extract_from_json_code_block(content: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()?;

    let block = re.captures(content)?.get(1)?.as_str().trim();
    block
        .starts_with('{')
        .then(|| balanced_object(block))
        .flatten()
}

/// First object found inside any fenced block.
pub fn extract_from_generic_code_block(content: &str) -> Option<String> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()?;

    re.captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .find_map(|block| first_balanced_object(block.as_str()))
}

fn balanced_object(s: &str) -> Option<String> {
    find_matching_brace(s).map(|end| s[..=end].to_string())
}

fn first_balanced_object(s: &str) -> Option<String> {
    s.char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(|(start, _)| balanced_object(&s[start..]))
        .find(|candidate| is_json_object(candidate))
}

fn is_json_object(candidate: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(candidate),
        Ok(serde_json::Value::Object(_))
    )
}

fn count_unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth
}

fn preview(s: &str) -> String {
    s.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_object() {
        let json = extract_json_object(r#"{"use_planner": false}"#).unwrap();
        assert_eq!(json, r#"{"use_planner": false}"#);
    }

    #[test]
    fn test_json_code_block() {
        let content = "Sure.\n```json\n{\"model\": \"gpt-4o\"}\n```\nGood luck!";
        assert_eq!(extract_json_object(content).unwrap(), "{\"model\": \"gpt-4o\"}");
    }

    #[test]
    fn test_generic_code_block() {
        let content = "```\nnotes first\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_object(content).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_object_after_prose() {
        let content = "I changed the solver prompt. {\"solver\": {\"system_prompt\": \"Be brief {really}\"}} Done.";
        let json = extract_json_object(content).unwrap();
        assert!(json.starts_with("{\"solver\""));
        assert!(json.ends_with("}}"));
    }

    #[test]
    fn test_skips_invalid_braces_before_object() {
        let content = "Use {placeholders} like this: {\"ok\": true}";
        assert_eq!(extract_json_object(content).unwrap(), "{\"ok\": true}");
    }

    #[test]
    fn test_braces_in_strings() {
        let s = r#"{"template": "{{ question }}", "x": "\"}"}"#;
        assert_eq!(find_matching_brace(s), Some(s.len() - 1));
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(matches!(
            extract_json_object("[1, 2, 3]"),
            Err(JsonExtractionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let err = extract_json_object("{\"planner\": {\"system_prompt\": \"Think").unwrap_err();
        match err {
            JsonExtractionError::Truncated {
                unclosed_braces, ..
            } => assert_eq!(unclosed_braces, 2),
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert_eq!(
            err,
            JsonExtractionError::NotFound {
                preview: "I cannot help with that.".to_string()
            }
        );
    }
}
