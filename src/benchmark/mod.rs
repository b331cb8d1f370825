//! Benchmark execution against a fixed evaluation set.
//!
//! ```text
//! EvaluationSet + AgentConfig → BenchmarkRunner → BenchmarkReport → metrics()
//! ```
//!
//! # Example
//!
//! ```ignore
//! use qa_forge::agent::AgentConfig;
//! use qa_forge::benchmark::{BenchmarkRunner, EvaluationSet};
//!
//! let runner = BenchmarkRunner::new(provider);
//! let report = runner
//!     .run(&AgentConfig::default(), &EvaluationSet::builtin(), true)
//!     .await?;
//!
//! println!("Success rate: {:.1}%", report.success_rate * 100.0);
//! ```

pub mod eval_set;
pub mod report;
pub mod runner;

pub use eval_set::{EvaluationItem, EvaluationSet};
pub use report::{
    success_rate, BenchmarkReport, Metrics, QuestionResult, NUM_EXAMPLES_KEY, SUCCESS_RATE_KEY,
};
pub use runner::BenchmarkRunner;
