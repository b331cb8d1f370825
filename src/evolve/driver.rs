//! The evolution loop: score the seed, mutate, keep the best.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use super::config::EvolutionConfig;
use super::mutator::CandidateMutator;
use crate::agent::AgentConfig;
use crate::error::EvolveError;
use crate::llm::LlmProvider;
use crate::scoring::{FitnessScore, PipelineCandidate, Scorer};

/// What happened in one mutation round.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    /// Round number, starting at 1.
    pub iteration: usize,
    /// Score of the proposed child; `None` when no child was produced.
    pub score: Option<FitnessScore>,
    /// Whether the child replaced the incumbent.
    pub accepted: bool,
    /// Why the round produced no child.
    pub error: Option<String>,
    /// Wall time of the round in milliseconds.
    pub duration_ms: u64,
}

/// Result of an evolution run.
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionOutcome {
    /// Best configuration found.
    pub best_config: AgentConfig,
    /// Serialized form of the best configuration as it was scored.
    pub best_source: String,
    /// Score of the best configuration.
    pub best_score: FitnessScore,
    /// Score of the seed configuration.
    pub initial_score: FitnessScore,
    /// One record per mutation round.
    pub history: Vec<IterationRecord>,
}

impl EvolutionOutcome {
    /// Whether any child beat the seed.
    pub fn improved(&self) -> bool {
        self.best_score.score > self.initial_score.score
    }

    /// Number of accepted children.
    pub fn accepted_count(&self) -> usize {
        self.history.iter().filter(|r| r.accepted).count()
    }
}

/// Greedy keep-best search over agent configurations.
pub struct Evolution {
    provider: Arc<dyn LlmProvider>,
    mutator: Arc<dyn CandidateMutator>,
    scorer: Scorer,
    config: EvolutionConfig,
}

impl Evolution {
    /// Creates a driver.
    ///
    /// `provider` backs the candidates' pipelines; `mutator` proposes children.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        mutator: Arc<dyn CandidateMutator>,
        scorer: Scorer,
        config: EvolutionConfig,
    ) -> Self {
        Self {
            provider,
            mutator,
            scorer,
            config,
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Runs `max_iterations` mutation rounds starting from `seed`.
    ///
    /// A child replaces the incumbent only when it scores strictly higher.
    /// Failed mutations are recorded and skipped.
    ///
    /// # Errors
    ///
    /// Fails only when the evolution settings or the seed configuration are
    /// invalid.
    pub async fn run(&self, seed: &AgentConfig) -> Result<EvolutionOutcome, EvolveError> {
        self.config.validate()?;
        seed.validate()?;

        info!(
            iterations = self.config.max_iterations,
            models = ?self.config.models,
            eval_items = self.scorer.eval_set().len(),
            "Starting evolution"
        );

        let initial_score = self.score_config(seed).await;
        info!(score = initial_score.score, "Seed scored");

        let mut best_config = seed.clone();
        let mut best_source = seed.to_yaml()?;
        let mut best_score = initial_score;
        let mut history = Vec::with_capacity(self.config.max_iterations);

        for iteration in 1..=self.config.max_iterations {
            let start = Instant::now();

            let child_source = match self.mutator.propose(&best_source, &best_score, iteration).await {
                Ok(source) => source,
                Err(e) => {
                    warn!(iteration, error = %e, "Mutation failed, skipping iteration");
                    history.push(IterationRecord {
                        iteration,
                        score: None,
                        accepted: false,
                        error: Some(e.to_string()),
                        duration_ms: start.elapsed().as_millis() as u64,
                    });
                    continue;
                }
            };

            let (child_config, score) = match AgentConfig::parse(&child_source) {
                Ok(config) => {
                    let score = self.score_config(&config).await;
                    (Some(config), score)
                }
                Err(e) => {
                    warn!(iteration, error = %e, "Child is not a valid configuration");
                    (None, FitnessScore::zero())
                }
            };

            let accepted = score.score > best_score.score;
            if let (true, Some(config)) = (accepted, child_config) {
                best_config = config;
                best_source = child_source;
                best_score = score;
            }

            info!(
                iteration,
                score = score.score,
                best = best_score.score,
                accepted,
                "Iteration complete"
            );

            history.push(IterationRecord {
                iteration,
                score: Some(score),
                accepted,
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        info!(
            initial = initial_score.score,
            best = best_score.score,
            "Evolution finished"
        );

        Ok(EvolutionOutcome {
            best_config,
            best_source,
            best_score,
            initial_score,
            history,
        })
    }

    async fn score_config(&self, config: &AgentConfig) -> FitnessScore {
        let candidate = PipelineCandidate::new(self.provider.clone(), config.clone());
        self.scorer.score(&candidate).await
    }
}

/// Writes the best configuration of `outcome` to `path` as YAML.
///
/// Returns `false` without touching the filesystem when the outcome carries
/// no best candidate source.
pub fn persist_best(outcome: &EvolutionOutcome, path: impl AsRef<Path>) -> Result<bool, EvolveError> {
    let path = path.as_ref();

    if outcome.best_source.trim().is_empty() {
        warn!(path = %path.display(), "No best candidate to save");
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let yaml = outcome.best_config.to_yaml()?;
    std::fs::write(path, yaml)?;

    info!(path = %path.display(), score = outcome.best_score.score, "Saved best candidate");
    Ok(true)
}
