//! Command-line interface for qa-forge.
//!
//! Provides commands to benchmark, score and evolve agent configurations.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
