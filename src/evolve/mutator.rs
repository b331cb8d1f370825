//! Candidate mutation.
//!
//! A mutator proposes a child configuration from a parent and its score. The
//! driver only sees serialized text, so any search collaborator that can emit
//! an `AgentConfig` as JSON or YAML can stand in for [`LlmMutator`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::EvolutionConfig;
use crate::agent::AgentConfig;
use crate::error::{EvolveError, LlmError};
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::scoring::FitnessScore;
use crate::utils::json_extraction::{extract_json_object, JsonExtractionError};

/// Proposes child candidates.
#[async_trait]
pub trait CandidateMutator: Send + Sync {
    /// Produce a child candidate's source from its parent.
    ///
    /// `iteration` counts from 1.
    async fn propose(
        &self,
        parent_source: &str,
        parent_score: &FitnessScore,
        iteration: usize,
    ) -> Result<String, EvolveError>;
}

const MUTATION_SYSTEM_PROMPT: &str = r#"You improve the configuration of a two-stage question answering agent.

A planner call (optional) writes a short plan for a question, then a solver call answers it.
An answer passes when it contains an expected substring, so short, direct answers that name
the fact explicitly score best.

The configuration is a JSON object with these fields:
- "use_planner": boolean, whether the planner stage runs
- "model": string, the model backing both stages
- "planner" and "solver": objects with
  - "system_prompt": string
  - "user_template": optional Tera template; the planner sees {{ question }}, the solver sees
    {{ question }} and {{ plan }}
  - "max_tokens": optional integer
  - "temperature": optional number between 0.0 and 2.0
  - "model": optional string overriding the shared model

Output Format:
You MUST respond with ONLY the complete improved configuration as a single JSON object.
Do not include any text outside the JSON object."#;

const MUTATION_USER_TEMPLATE: &str = r#"Iteration {iteration}.

The current configuration answered {success_rate}% of the evaluation questions correctly
(score {score}).

Current configuration:
{parent}

Propose one improved configuration."#;

/// Mutator that asks a language model to rewrite the parent configuration.
pub struct LlmMutator {
    llm_client: Arc<dyn LlmProvider>,
    models: Vec<String>,
    temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for LlmMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmMutator")
            .field("models", &self.models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl LlmMutator {
    /// Creates a mutator using the models and sampling settings of `config`.
    pub fn new(llm_client: Arc<dyn LlmProvider>, config: &EvolutionConfig) -> Self {
        Self {
            llm_client,
            models: config.models.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Model used for `iteration`, cycling through the configured models.
    pub fn model_for(&self, iteration: usize) -> &str {
        if self.models.is_empty() {
            return "";
        }
        &self.models[iteration.saturating_sub(1) % self.models.len()]
    }

    fn build_prompt(parent_json: &str, parent_score: &FitnessScore, iteration: usize) -> String {
        MUTATION_USER_TEMPLATE
            .replace("{iteration}", &iteration.to_string())
            .replace(
                "{success_rate}",
                &format!("{:.1}", parent_score.success_rate * 100.0),
            )
            .replace("{score}", &format!("{:.3}", parent_score.score))
            .replace("{parent}", parent_json)
    }
}

#[async_trait]
impl CandidateMutator for LlmMutator {
    async fn propose(
        &self,
        parent_source: &str,
        parent_score: &FitnessScore,
        iteration: usize,
    ) -> Result<String, EvolveError> {
        // Show the model the canonical JSON form whatever format the parent came in.
        let parent = AgentConfig::parse(parent_source)?;
        let prompt = Self::build_prompt(&parent.to_json()?, parent_score, iteration);

        let model = self.model_for(iteration);
        debug!(iteration, model, "Requesting mutation");

        let request = GenerationRequest::new(
            model,
            vec![Message::system(MUTATION_SYSTEM_PROMPT), Message::user(prompt)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.llm_client.generate(request).await?;
        let content = response.first_content().ok_or(LlmError::EmptyResponse)?;

        let json = extract_json_object(content).map_err(|e| {
            if let JsonExtractionError::Truncated { unclosed_braces, .. } = &e {
                warn!(
                    unclosed_braces,
                    max_tokens = self.max_tokens,
                    "Mutation response appears truncated"
                );
            }
            EvolveError::Mutation(e.to_string())
        })?;

        // Reject children that would not even load before they cost a benchmark run.
        let child = AgentConfig::parse(&json)
            .map_err(|e| EvolveError::Mutation(format!("proposed configuration is invalid: {}", e)))?;
        child
            .validate()
            .map_err(|e| EvolveError::Mutation(format!("proposed configuration is invalid: {}", e)))?;

        Ok(json)
    }
}
