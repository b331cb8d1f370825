//! Answer grading by substring containment.
//!
//! The verdict is a pure function of the answer, the expected substring and
//! the match mode.

use serde::{Deserialize, Serialize};

/// How the expected substring is compared against an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-sensitive substring match.
    #[default]
    Exact,
    /// Substring match after lowercasing both sides.
    IgnoreCase,
    /// Substring match after lowercasing and dropping everything that is not
    /// alphanumeric or whitespace, on both sides.
    Normalized,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::IgnoreCase => write!(f, "ignore_case"),
            MatchMode::Normalized => write!(f, "normalized"),
        }
    }
}

/// Returns true iff `expected` occurs in `answer` under `mode`.
///
/// An empty expected substring matches every answer.
pub fn is_correct(answer: &str, expected: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Exact => answer.contains(expected),
        MatchMode::IgnoreCase => answer.to_lowercase().contains(&expected.to_lowercase()),
        MatchMode::Normalized => normalize(answer).contains(&normalize(expected)),
    }
}

/// Lowercase and keep only alphanumerics and whitespace.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_is_case_sensitive() {
        assert!(is_correct("The capital of France is Paris.", "Paris", MatchMode::Exact));
        assert!(!is_correct("the capital of france is paris.", "Paris", MatchMode::Exact));
        assert!(!is_correct("I do not know.", "Paris", MatchMode::Exact));
    }

    #[test]
    fn test_ignore_case() {
        assert!(is_correct("PARIS, obviously", "paris", MatchMode::IgnoreCase));
        assert!(!is_correct("Lyon", "paris", MatchMode::IgnoreCase));
    }

    #[test]
    fn test_normalized_strips_punctuation() {
        assert!(is_correct("It's H₂O... no, H2O!", "h2o", MatchMode::Normalized));
        assert!(is_correct("Leonardo da Vinci painted it.", "leonardo da vinci", MatchMode::Normalized));
        assert!(is_correct("Water boils at 100°C.", "100", MatchMode::Normalized));
        assert!(!is_correct("Jane-Austen", "jane austen", MatchMode::Normalized));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Hello, World!"), "hello world");
        assert_eq!(normalize("  A.B  "), "  ab  ");
    }

    #[test]
    fn test_empty_expected_always_matches() {
        assert!(is_correct("anything", "", MatchMode::Exact));
        assert!(is_correct("", "", MatchMode::Normalized));
    }

    #[test]
    fn test_grading_is_deterministic() {
        let answer = "The largest ocean is the Pacific Ocean.";
        let first = is_correct(answer, "Pacific", MatchMode::Exact);
        for _ in 0..10 {
            assert_eq!(is_correct(answer, "Pacific", MatchMode::Exact), first);
        }
    }

    #[test]
    fn test_match_mode_serde() {
        let mode: MatchMode = serde_yaml::from_str("ignore_case").expect("parses");
        assert_eq!(mode, MatchMode::IgnoreCase);
        assert_eq!(MatchMode::default(), MatchMode::Exact);
    }
}
