//! Agent configuration: the mutable surface of a candidate.
//!
//! An [`AgentConfig`] is plain data. The search procedure rewrites it between
//! runs and the benchmark runner receives it explicitly, so several
//! configurations can be evaluated side by side in one process.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::prompts::{
    render_template, DEFAULT_PLANNER_SYSTEM_PROMPT, DEFAULT_PLANNER_TEMPLATE,
    DEFAULT_SOLVER_SYSTEM_PROMPT, DEFAULT_SOLVER_TEMPLATE, SAMPLE_PLAN, SAMPLE_QUESTION,
};
use crate::error::ConfigError;
use crate::llm::DEFAULT_MODEL;

/// One of the two pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Optional first call that decomposes the question into a plan.
    Planner,
    /// Second call that produces the final answer.
    Solver,
}

impl Stage {
    /// Template used when the stage does not set `user_template`.
    pub fn default_template(self) -> &'static str {
        match self {
            Stage::Planner => DEFAULT_PLANNER_TEMPLATE,
            Stage::Solver => DEFAULT_SOLVER_TEMPLATE,
        }
    }

    /// Token limit used when the stage does not set `max_tokens`.
    pub fn default_max_tokens(self) -> u32 {
        match self {
            Stage::Planner => 128,
            Stage::Solver => 64,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Planner => write!(f, "planner"),
            Stage::Solver => write!(f, "solver"),
        }
    }
}

/// Settings for a single stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// System message. Left out of the request when blank.
    pub system_prompt: String,
    /// Tera template for the user message. Falls back to the stage default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_template: Option<String>,
    /// Completion token limit. Falls back to the stage default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature; provider default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Per-stage model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl StageConfig {
    /// Create a stage with the given system prompt and default settings.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    /// Set the user-message template.
    pub fn with_user_template(mut self, template: impl Into<String>) -> Self {
        self.user_template = Some(template.into());
        self
    }

    /// Set the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the model for this stage.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Effective user-message template for `stage`.
    pub fn template(&self, stage: Stage) -> &str {
        self.user_template
            .as_deref()
            .unwrap_or_else(|| stage.default_template())
    }

    /// Effective token limit for `stage`.
    pub fn effective_max_tokens(&self, stage: Stage) -> u32 {
        self.max_tokens.unwrap_or_else(|| stage.default_max_tokens())
    }

    fn validate(&self, stage: Stage) -> Result<(), ConfigError> {
        if self.max_tokens == Some(0) {
            return Err(ConfigError::ValidationFailed(format!(
                "{stage}.max_tokens must be greater than 0"
            )));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationFailed(format!(
                    "{stage}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        if matches!(self.model.as_deref(), Some(m) if m.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(format!(
                "{stage}.model cannot be empty when set"
            )));
        }

        let plan = match stage {
            Stage::Planner => None,
            Stage::Solver => Some(SAMPLE_PLAN),
        };
        render_template(self.template(stage), SAMPLE_QUESTION, plan).map_err(|message| {
            ConfigError::Template {
                stage: stage.to_string(),
                message,
            }
        })?;

        Ok(())
    }
}

/// Configuration of the planner/solver pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Whether the planner stage runs at all.
    pub use_planner: bool,
    /// Model backing both stages unless a stage overrides it.
    pub model: String,
    /// Planner stage settings.
    pub planner: StageConfig,
    /// Solver stage settings.
    pub solver: StageConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            use_planner: true,
            model: DEFAULT_MODEL.to_string(),
            planner: StageConfig::new(DEFAULT_PLANNER_SYSTEM_PROMPT),
            solver: StageConfig::new(DEFAULT_SOLVER_SYSTEM_PROMPT),
        }
    }
}

impl AgentConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the planner stage.
    pub fn with_planner(mut self, enabled: bool) -> Self {
        self.use_planner = enabled;
        self
    }

    /// Set the model shared by both stages.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replace the planner stage settings.
    pub fn with_planner_stage(mut self, planner: StageConfig) -> Self {
        self.planner = planner;
        self
    }

    /// Replace the solver stage settings.
    pub fn with_solver_stage(mut self, solver: StageConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Settings for `stage`.
    pub fn stage(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::Planner => &self.planner,
            Stage::Solver => &self.solver,
        }
    }

    /// Model used for `stage`, honouring per-stage overrides.
    pub fn model_for(&self, stage: Stage) -> &str {
        self.stage(stage).model.as_deref().unwrap_or(&self.model)
    }

    /// Validates the configuration.
    ///
    /// The planner stage is only checked when it is enabled.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for out-of-range values and
    /// `ConfigError::Template` for templates that do not render.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if self.use_planner {
            self.planner.validate(Stage::Planner)?;
        }
        self.solver.validate(Stage::Solver)?;

        Ok(())
    }

    /// Parse a configuration from JSON or YAML text.
    ///
    /// Text starting with `{` is read as JSON, anything else as YAML.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') {
            Ok(serde_json::from_str(trimmed)?)
        } else {
            Ok(serde_yaml::from_str(text)?)
        }
    }

    /// Load and validate a configuration file (`.json`, otherwise YAML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = if has_json_extension(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
