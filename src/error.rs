//! Error types for qa-forge operations.
//!
//! Defines the error types for each subsystem:
//! - LLM API interactions
//! - Configuration loading and validation
//! - Benchmark runs and candidate evaluation
//! - The evolution driver

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("LLM returned an empty completion")]
    EmptyResponse,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid {stage} template: {message}")]
    Template { stage: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a whole benchmark run.
///
/// Per-question completion failures never surface here; they are recorded on
/// the affected `QuestionResult` instead.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Benchmark configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Candidate failed: {0}")]
    Candidate(String),
}

/// Errors that can occur while driving an evolution run.
#[derive(Debug, Error)]
pub enum EvolveError {
    #[error("Evolution configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mutation failed: {0}")]
    Mutation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::ApiError {
            code: 401,
            message: "invalid key".to_string(),
        };
        assert_eq!(err.to_string(), "API error (401): invalid key");
        assert!(LlmError::MissingApiKey.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_benchmark_error_from_config() {
        let err: BenchmarkError = ConfigError::ValidationFailed("model cannot be empty".into()).into();
        assert!(matches!(err, BenchmarkError::Config(_)));
        assert!(err.to_string().contains("model cannot be empty"));
    }

    #[test]
    fn test_template_error_display() {
        let err = ConfigError::Template {
            stage: "solver".to_string(),
            message: "unexpected end".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid solver template: unexpected end");
    }
}
