//! Evolution run configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::DEFAULT_MODEL;

/// Settings for an evolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of mutation rounds after the seed is scored.
    pub max_iterations: usize,
    /// Models that propose mutations, used round-robin.
    pub models: Vec<String>,
    /// Sampling temperature for mutation requests.
    pub temperature: f64,
    /// Token limit for mutation requests.
    pub max_tokens: u32,
    /// Where the best candidate is written.
    pub output_path: PathBuf,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            models: vec![DEFAULT_MODEL.to_string()],
            temperature: 0.7,
            max_tokens: 2048,
            output_path: PathBuf::from("best_config.yaml"),
        }
    }
}

impl EvolutionConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EVOLVE_MAX_ITERATIONS`: Mutation rounds (default: 8)
    /// - `EVOLVE_MODELS`: Comma-separated mutation models (default: gpt-4o-mini)
    /// - `EVOLVE_TEMPERATURE`: Mutation temperature (default: 0.7)
    /// - `EVOLVE_MAX_TOKENS`: Mutation token limit (default: 2048)
    /// - `EVOLVE_OUTPUT_PATH`: Best candidate path (default: best_config.yaml)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("EVOLVE_MAX_ITERATIONS") {
            config.max_iterations = parse_env_value(&val, "EVOLVE_MAX_ITERATIONS")?;
        }

        if let Some(val) = lookup("EVOLVE_MODELS") {
            config.models = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(val) = lookup("EVOLVE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "EVOLVE_TEMPERATURE")?;
        }

        if let Some(val) = lookup("EVOLVE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "EVOLVE_MAX_TOKENS")?;
        }

        if let Some(val) = lookup("EVOLVE_OUTPUT_PATH") {
            config.output_path = PathBuf::from(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one evolution model is required".to_string(),
            ));
        }

        if self.models.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "evolution model names cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the number of iterations.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Builder method to set the mutation models.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Builder method to set temperature.
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    /// Builder method to set the mutation token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder method to set the output path.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
