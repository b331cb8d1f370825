//! Evolution driver.
//!
//! ```text
//! seed ──score──▶ best ──propose──▶ child ──score──▶ keep if strictly better
//!                   ▲                                        │
//!                   └────────────────────────────────────────┘ × max_iterations
//! ```
//!
//! Candidates are serialized [`AgentConfig`](crate::agent::AgentConfig)s, so a
//! mutation can never inject executable code, only configuration.

pub mod config;
pub mod driver;
pub mod mutator;

pub use config::EvolutionConfig;
pub use driver::{persist_best, Evolution, EvolutionOutcome, IterationRecord};
pub use mutator::{CandidateMutator, LlmMutator};
