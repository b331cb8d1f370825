//! Evaluation sets: the fixed questions a candidate is scored against.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::config::has_json_extension;
use crate::agent::MatchMode;
use crate::error::ConfigError;

/// A question and the substring a correct answer must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationItem {
    /// Question put to the pipeline.
    pub question: String,
    /// Substring the answer has to contain to pass.
    pub expected_substring: String,
}

impl EvaluationItem {
    /// Create a new evaluation item.
    pub fn new(question: impl Into<String>, expected_substring: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expected_substring: expected_substring.into(),
        }
    }
}

/// An ordered list of evaluation items plus the grading rule.
///
/// The match mode lives here rather than on the agent configuration so that a
/// candidate cannot relax its own grading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSet {
    /// How expected substrings are matched.
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Items in evaluation order.
    pub items: Vec<EvaluationItem>,
}

/// Questions shipped with qa-forge, graded with [`MatchMode::Normalized`].
const BUILTIN_ITEMS: &[(&str, &str)] = &[
    ("What is the capital of France?", "paris"),
    ("Who wrote the novel Pride and Prejudice?", "jane austen"),
    ("What is the chemical formula for water?", "h2o"),
    ("What is the capital of Italy?", "rome"),
    ("What is the largest ocean on Earth?", "pacific"),
    ("Who painted the Mona Lisa?", "leonardo da vinci"),
    ("What is the boiling point of water?", "100"),
];

impl EvaluationSet {
    /// Create a set with exact, case-sensitive matching.
    pub fn new(items: Vec<EvaluationItem>) -> Self {
        Self {
            match_mode: MatchMode::Exact,
            items,
        }
    }

    /// Set the match mode.
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// The built-in general-knowledge set.
    pub fn builtin() -> Self {
        let items = BUILTIN_ITEMS
            .iter()
            .map(|(question, expected)| EvaluationItem::new(*question, *expected))
            .collect();
        Self::new(items).with_match_mode(MatchMode::Normalized)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep only the first `n` items.
    pub fn truncated(mut self, n: usize) -> Self {
        self.items.truncate(n);
        self
    }

    /// Load an evaluation set from a `.json` or YAML file.
    ///
    /// Accepts either the full `{ match_mode, items }` document or a bare
    /// list of items (graded exactly).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let file: EvaluationFile = if has_json_extension(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        let set = match file {
            EvaluationFile::Set(set) => set,
            EvaluationFile::Items(items) => Self::new(items),
        };
        set.validate()?;
        Ok(set)
    }

    /// Every item needs a non-blank question.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(index) = self.items.iter().position(|i| i.question.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(format!(
                "evaluation item {} has an empty question",
                index + 1
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EvaluationFile {
    Set(EvaluationSet),
    Items(Vec<EvaluationItem>),
}
