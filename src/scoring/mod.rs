//! Candidate scoring.
//!
//! The [`Scorer`] turns a candidate's benchmark metrics into the
//! [`FitnessScore`] a search procedure consumes. Scoring never fails: a
//! candidate that errors, panics, or reports malformed metrics is simply
//! worth zero.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::AgentConfig;
use crate::benchmark::{BenchmarkRunner, EvaluationSet, Metrics, SUCCESS_RATE_KEY};
use crate::error::BenchmarkError;
use crate::llm::LlmProvider;

/// The scalar fitness handed to a search procedure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessScore {
    /// Primary fitness.
    pub score: f64,
    /// Aggregate of all objectives. With a single objective this equals
    /// `score`.
    pub combined_score: f64,
    /// Fraction of evaluation items answered correctly.
    pub success_rate: f64,
}

impl FitnessScore {
    /// The score of a worthless candidate.
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            combined_score: 0.0,
            success_rate: 0.0,
        }
    }

    /// Build a score from a success rate.
    pub fn from_success_rate(success_rate: f64) -> Self {
        Self {
            score: success_rate,
            combined_score: success_rate,
            success_rate,
        }
    }

    /// Read the success rate out of benchmark metrics.
    ///
    /// Returns `None` when `success_rate` is missing, not finite, or outside
    /// `[0, 1]`.
    pub fn from_metrics(metrics: &Metrics) -> Option<Self> {
        let rate = *metrics.get(SUCCESS_RATE_KEY)?;
        if rate.is_finite() && (0.0..=1.0).contains(&rate) {
            Some(Self::from_success_rate(rate))
        } else {
            None
        }
    }
}

impl Default for FitnessScore {
    fn default() -> Self {
        Self::zero()
    }
}

/// Anything that can be benchmarked against a harness-supplied evaluation set.
#[async_trait]
pub trait Candidate: Send + Sync {
    /// Run the benchmark and return its metrics.
    async fn run_benchmark(&self, eval_set: &EvaluationSet) -> Result<Metrics, BenchmarkError>;
}

/// A candidate made of an agent configuration run through the real pipeline.
/// Benchmarks run without transcripts.
pub struct PipelineCandidate {
    runner: BenchmarkRunner,
    config: AgentConfig,
}

impl PipelineCandidate {
    /// Creates a candidate for `config` backed by `provider`.
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self {
            runner: BenchmarkRunner::new(provider),
            config,
        }
    }
}

#[async_trait]
impl Candidate for PipelineCandidate {
    async fn run_benchmark(&self, eval_set: &EvaluationSet) -> Result<Metrics, BenchmarkError> {
        let report = self.runner.run(&self.config, eval_set, false).await?;
        Ok(report.metrics())
    }
}

/// Scores candidates against a fixed evaluation set.
#[derive(Debug, Clone)]
pub struct Scorer {
    eval_set: EvaluationSet,
}

impl Scorer {
    /// Creates a scorer for `eval_set`.
    pub fn new(eval_set: EvaluationSet) -> Self {
        Self { eval_set }
    }

    /// The evaluation set every candidate is scored against.
    pub fn eval_set(&self) -> &EvaluationSet {
        &self.eval_set
    }

    /// Score a candidate. One attempt, no retries, never fails.
    pub async fn score<C>(&self, candidate: &C) -> FitnessScore
    where
        C: Candidate + ?Sized,
    {
        let run = AssertUnwindSafe(candidate.run_benchmark(&self.eval_set));
        let metrics = match run.catch_unwind().await {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                warn!(error = %e, "Candidate benchmark failed, scoring zero");
                return FitnessScore::zero();
            }
            Err(_) => {
                warn!("Candidate benchmark panicked, scoring zero");
                return FitnessScore::zero();
            }
        };

        match FitnessScore::from_metrics(&metrics) {
            Some(score) => {
                debug!(score = score.score, "Candidate scored");
                score
            }
            None => {
                warn!(?metrics, "Candidate metrics lack a valid success_rate, scoring zero");
                FitnessScore::zero()
            }
        }
    }

    /// Score a serialized agent configuration (JSON or YAML).
    ///
    /// Text that does not parse, or parses into an invalid configuration,
    /// scores zero.
    pub async fn score_source(&self, provider: Arc<dyn LlmProvider>, source: &str) -> FitnessScore {
        let config = match AgentConfig::parse(source) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Candidate source is not a valid configuration, scoring zero");
                return FitnessScore::zero();
            }
        };
        self.score(&PipelineCandidate::new(provider, config)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{EvaluationItem, NUM_EXAMPLES_KEY};
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationRequest, GenerationResponse, Message, Usage};

    struct FixedMetrics(Metrics);

    #[async_trait]
    impl Candidate for FixedMetrics {
        async fn run_benchmark(&self, _eval_set: &EvaluationSet) -> Result<Metrics, BenchmarkError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Candidate for Failing {
        async fn run_benchmark(&self, _eval_set: &EvaluationSet) -> Result<Metrics, BenchmarkError> {
            Err(BenchmarkError::Candidate("boom".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Candidate for Panicking {
        async fn run_benchmark(&self, _eval_set: &EvaluationSet) -> Result<Metrics, BenchmarkError> {
            panic!("candidate exploded");
        }
    }

    struct AnswerProvider(&'static str);

    #[async_trait]
    impl LlmProvider for AnswerProvider {
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            Ok(GenerationResponse {
                id: "mock".to_string(),
                model: "mock".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(self.0),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn metrics(pairs: &[(&str, f64)]) -> Metrics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn scorer() -> Scorer {
        Scorer::new(EvaluationSet::new(vec![EvaluationItem::new(
            "What is the capital of France?",
            "Paris",
        )]))
    }

    #[test]
    fn test_from_metrics() {
        let score = FitnessScore::from_metrics(&metrics(&[(SUCCESS_RATE_KEY, 0.75)]))
            .expect("valid metrics");
        assert_eq!(score.score, 0.75);
        assert_eq!(score.combined_score, 0.75);
        assert_eq!(score.success_rate, 0.75);

        assert!(FitnessScore::from_metrics(&metrics(&[(NUM_EXAMPLES_KEY, 3.0)])).is_none());
        assert!(FitnessScore::from_metrics(&metrics(&[(SUCCESS_RATE_KEY, f64::NAN)])).is_none());
        assert!(FitnessScore::from_metrics(&metrics(&[(SUCCESS_RATE_KEY, 1.5)])).is_none());
    }

    #[test]
    fn test_zero_serializes_all_fields() {
        let json = serde_json::to_value(FitnessScore::zero()).expect("serializes");
        assert_eq!(json["score"], 0.0);
        assert_eq!(json["combined_score"], 0.0);
        assert_eq!(json["success_rate"], 0.0);
    }

    #[tokio::test]
    async fn test_score_passes_success_rate_through() {
        let candidate = FixedMetrics(metrics(&[(SUCCESS_RATE_KEY, 0.5), (NUM_EXAMPLES_KEY, 2.0)]));
        assert_eq!(
            scorer().score(&candidate).await,
            FitnessScore::from_success_rate(0.5)
        );
    }

    #[tokio::test]
    async fn test_failures_score_zero() {
        let scorer = scorer();
        assert_eq!(scorer.score(&Failing).await, FitnessScore::zero());
        assert_eq!(scorer.score(&Panicking).await, FitnessScore::zero());
        assert_eq!(
            scorer.score(&FixedMetrics(Metrics::new())).await,
            FitnessScore::zero()
        );
    }

    #[tokio::test]
    async fn test_score_source() {
        let scorer = scorer();
        let provider: Arc<dyn LlmProvider> = Arc::new(AnswerProvider("The capital is Paris."));

        let good = scorer
            .score_source(provider.clone(), r#"{"use_planner": false}"#)
            .await;
        assert_eq!(good.score, 1.0);

        let garbage = scorer.score_source(provider.clone(), "use_planner: [").await;
        assert_eq!(garbage, FitnessScore::zero());

        let invalid = scorer
            .score_source(provider, "use_planner: false\nmodel: \"\"\n")
            .await;
        assert_eq!(invalid, FitnessScore::zero());
    }
}
