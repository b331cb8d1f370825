//! Per-question results and the aggregate benchmark report.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Usage;

/// Metric key carrying the success rate.
pub const SUCCESS_RATE_KEY: &str = "success_rate";

/// Metric key carrying the number of evaluated questions.
pub const NUM_EXAMPLES_KEY: &str = "num_examples";

/// Scalar metrics produced by a benchmark run, keyed by name.
pub type Metrics = BTreeMap<String, f64>;

/// Outcome of one evaluation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// The question asked.
    pub question: String,
    /// Substring the answer had to contain.
    pub expected_substring: String,
    /// Planner output; `None` when the planner is disabled or failed.
    pub planner_output: Option<String>,
    /// Solver output; empty when the pipeline failed.
    pub solver_output: String,
    /// Whether the answer contained the expected substring.
    pub passed: bool,
    /// Why the pipeline failed, if it did.
    pub error: Option<String>,
    /// Wall time spent on this item in milliseconds.
    pub duration_ms: u64,
    /// Tokens consumed by this item.
    pub usage: Usage,
}

impl QuestionResult {
    /// Creates a result for a completed pipeline run.
    pub fn answered(
        question: impl Into<String>,
        expected_substring: impl Into<String>,
        planner_output: Option<String>,
        solver_output: impl Into<String>,
        passed: bool,
    ) -> Self {
        Self {
            question: question.into(),
            expected_substring: expected_substring.into(),
            planner_output,
            solver_output: solver_output.into(),
            passed,
            error: None,
            duration_ms: 0,
            usage: Usage::default(),
        }
    }

    /// Creates a failed result for a pipeline run that did not produce an answer.
    pub fn failed(
        question: impl Into<String>,
        expected_substring: impl Into<String>,
        planner_output: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            expected_substring: expected_substring.into(),
            planner_output,
            solver_output: String::new(),
            passed: false,
            error: Some(error.into()),
            duration_ms: 0,
            usage: Usage::default(),
        }
    }

    /// Sets the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Sets the token usage.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Aggregate of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Unique identifier for this run.
    pub run_id: String,
    /// Model the configuration named for its stages.
    pub model: String,
    /// One result per evaluation item, in evaluation order.
    pub results: Vec<QuestionResult>,
    /// Number of passed items.
    pub passed_count: usize,
    /// Number of evaluated items.
    pub num_examples: usize,
    /// `passed_count / num_examples`, or 0 for an empty set.
    pub success_rate: f64,
    /// Tokens consumed by the whole run.
    pub usage: Usage,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
    /// Total wall time in milliseconds.
    pub duration_ms: u64,
}

impl BenchmarkReport {
    /// Aggregate per-item results into a report.
    pub fn from_results(
        run_id: impl Into<String>,
        model: impl Into<String>,
        results: Vec<QuestionResult>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        let passed_count = results.iter().filter(|r| r.passed).count();
        let num_examples = results.len();

        let mut usage = Usage::default();
        for result in &results {
            usage += result.usage;
        }

        Self {
            run_id: run_id.into(),
            model: model.into(),
            success_rate: success_rate(passed_count, num_examples),
            passed_count,
            num_examples,
            results,
            usage,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
        }
    }

    /// Number of failed items.
    pub fn failed_count(&self) -> usize {
        self.num_examples - self.passed_count
    }

    /// Items that errored rather than answering wrongly.
    pub fn errored(&self) -> impl Iterator<Item = &QuestionResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }

    /// The scalar metrics handed to the scorer.
    pub fn metrics(&self) -> Metrics {
        let mut metrics = Metrics::new();
        metrics.insert(SUCCESS_RATE_KEY.to_string(), self.success_rate);
        metrics.insert(NUM_EXAMPLES_KEY.to_string(), self.num_examples as f64);
        metrics
    }
}

/// `passed / total`, defined as 0 for an empty evaluation set.
pub fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(passed: bool) -> QuestionResult {
        QuestionResult::answered("Q", "A", None, if passed { "A" } else { "B" }, passed)
    }

    #[test]
    fn test_success_rate_guard() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(1, 2), 0.5);
        assert_eq!(success_rate(7, 7), 1.0);
    }

    #[test]
    fn test_report_aggregates() {
        let results = vec![
            result(true).with_usage(Usage {
                prompt_tokens: 10,
                completion_tokens: 2,
                total_tokens: 12,
            }),
            result(false),
            result(true),
            QuestionResult::failed("Q", "A", None, "solver completion failed"),
        ];
        let report = BenchmarkReport::from_results("run-1", "gpt-4o-mini", results, Utc::now());

        assert_eq!(report.num_examples, 4);
        assert_eq!(report.passed_count, 2);
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.success_rate, 0.5);
        assert_eq!(report.usage.total_tokens, 12);
        assert_eq!(report.errored().count(), 1);
        assert!(report.completed_at >= report.started_at);
    }

    #[test]
    fn test_empty_report() {
        let report = BenchmarkReport::from_results("run-2", "m", Vec::new(), Utc::now());
        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.failed_count(), 0);
    }

    #[test]
    fn test_metrics() {
        let report = BenchmarkReport::from_results("run-3", "m", vec![result(true), result(false)], Utc::now());
        let metrics = report.metrics();
        assert_eq!(metrics.get(SUCCESS_RATE_KEY), Some(&0.5));
        assert_eq!(metrics.get(NUM_EXAMPLES_KEY), Some(&2.0));
    }

    #[test]
    fn test_failed_result() {
        let failed = QuestionResult::failed("Q", "A", Some("plan".into()), "timeout")
            .with_duration(Duration::from_millis(250));
        assert!(!failed.passed);
        assert!(failed.solver_output.is_empty());
        assert_eq!(failed.planner_output.as_deref(), Some("plan"));
        assert_eq!(failed.error.as_deref(), Some("timeout"));
        assert_eq!(failed.duration_ms, 250);
    }

    #[test]
    fn test_report_serialization() {
        let report = BenchmarkReport::from_results("run-4", "gpt-4o-mini", vec![result(true)], Utc::now());
        let json = serde_json::to_string_pretty(&report).expect("serialization should succeed");
        assert!(json.contains("\"success_rate\": 1.0"));
        assert!(json.contains("\"run_id\": \"run-4\""));
        assert!(json.contains("\"planner_output\": null"));
    }
}
