//! qa-forge: evolve a planner/solver question answering pipeline.
//!
//! A candidate is an [`agent::AgentConfig`]. The [`benchmark`] runner answers
//! a fixed evaluation set with it, the [`scoring`] module turns the result into
//! a [`scoring::FitnessScore`], and the [`evolve`] driver mutates candidates and
//! keeps the best one.

pub mod agent;
pub mod benchmark;
pub mod cli;
pub mod error;
pub mod evolve;
pub mod llm;
pub mod scoring;
pub mod utils;

// Re-export commonly used error types
pub use error::{BenchmarkError, ConfigError, EvolveError, LlmError};
