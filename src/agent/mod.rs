//! The planner/solver question answering agent.
//!
//! - [`config`]: the candidate configuration ([`AgentConfig`]) and its stages
//! - [`prompts`]: default prompts and Tera template rendering
//! - [`pipeline`]: issues the planner and solver calls for one question
//! - [`grading`]: substring-containment verdicts

pub mod config;
pub mod grading;
pub mod pipeline;
pub mod prompts;

pub use config::{AgentConfig, Stage, StageConfig};
pub use grading::{is_correct, normalize, MatchMode};
pub use pipeline::{PipelineFailure, PipelineOutput, QaPipeline, StageError};
