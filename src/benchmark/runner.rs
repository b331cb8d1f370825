//! Benchmark runner - answers every evaluation item and grades the answers.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::eval_set::{EvaluationItem, EvaluationSet};
use super::report::{BenchmarkReport, QuestionResult};
use crate::agent::{is_correct, AgentConfig, MatchMode, QaPipeline, Stage};
use crate::error::BenchmarkError;
use crate::llm::LlmProvider;

/// Runs an agent configuration against an evaluation set.
///
/// Items are processed strictly one after another, planner before solver, so
/// the report's results come out in evaluation order.
#[derive(Clone)]
pub struct BenchmarkRunner {
    pipeline: QaPipeline,
}

impl BenchmarkRunner {
    /// Creates a runner backed by `provider`.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            pipeline: QaPipeline::new(provider),
        }
    }

    /// Runs the benchmark.
    ///
    /// An invalid configuration or evaluation set fails before any item is
    /// processed. A completion failure on a single item marks that item
    /// failed and the run continues.
    pub async fn run(
        &self,
        config: &AgentConfig,
        eval_set: &EvaluationSet,
        verbose: bool,
    ) -> Result<BenchmarkReport, BenchmarkError> {
        config.validate()?;
        eval_set.validate()?;

        let run_id = format!("bench-{}", Uuid::new_v4());
        let model = config.model_for(Stage::Solver).to_string();
        let started_at = Utc::now();

        info!(
            run_id = %run_id,
            model = %model,
            use_planner = config.use_planner,
            items = eval_set.len(),
            "Starting benchmark run"
        );

        let mut results = Vec::with_capacity(eval_set.len());
        for (index, item) in eval_set.items.iter().enumerate() {
            let result = self.run_item(config, item, eval_set.match_mode).await;

            debug!(
                item = index + 1,
                passed = result.passed,
                duration_ms = result.duration_ms,
                "Item graded"
            );
            if verbose {
                print_transcript(index + 1, &result);
            }
            results.push(result);
        }

        let report = BenchmarkReport::from_results(run_id, model, results, started_at);

        info!(
            run_id = %report.run_id,
            passed = report.passed_count,
            total = report.num_examples,
            success_rate = report.success_rate,
            duration_ms = report.duration_ms,
            "Benchmark run completed"
        );

        Ok(report)
    }

    async fn run_item(
        &self,
        config: &AgentConfig,
        item: &EvaluationItem,
        mode: MatchMode,
    ) -> QuestionResult {
        let start = Instant::now();

        match self.pipeline.run(config, &item.question).await {
            Ok(output) => {
                let passed = is_correct(&output.answer, &item.expected_substring, mode);
                QuestionResult::answered(
                    &item.question,
                    &item.expected_substring,
                    output.plan,
                    output.answer,
                    passed,
                )
                .with_usage(output.usage)
                .with_duration(start.elapsed())
            }
            Err(failure) => {
                warn!(
                    stage = %failure.error.stage(),
                    error = %failure.error,
                    "Question could not be answered, marking it failed"
                );
                QuestionResult::failed(
                    &item.question,
                    &item.expected_substring,
                    failure.plan,
                    failure.error.to_string(),
                )
                .with_usage(failure.usage)
                .with_duration(start.elapsed())
            }
        }
    }
}

fn print_transcript(number: usize, result: &QuestionResult) {
    println!("--- Question {} ---", number);
    println!("Q: {}", result.question);
    if let Some(plan) = &result.planner_output {
        println!("Plan: {}", plan);
    }
    match &result.error {
        Some(error) => println!("A: <error: {}>", error),
        None => println!("A: {}", result.solver_output),
    }
    println!(
        "Expected: {} -> {}",
        result.expected_substring,
        if result.passed { "PASS" } else { "FAIL" }
    );
    println!();
}
