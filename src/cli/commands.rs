//! CLI command definitions for qa-forge.
//!
//! - `bench`: run an agent configuration against an evaluation set
//! - `score`: score a serialized candidate configuration
//! - `evolve`: mutate a seed configuration and keep the best

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser};
use serde::Serialize;
use tracing::info;

use crate::agent::AgentConfig;
use crate::benchmark::{BenchmarkReport, BenchmarkRunner, EvaluationSet};
use crate::evolve::{persist_best, Evolution, EvolutionConfig, IterationRecord, LlmMutator};
use crate::llm::{LlmProvider, OpenAiClient, DEFAULT_MODEL, OPENAI_BASE_URL};
use crate::scoring::{FitnessScore, Scorer};

/// Evolve planner/solver question answering configurations.
#[derive(Parser)]
#[command(name = "qa-forge")]
#[command(about = "Benchmark, score and evolve planner/solver QA pipelines")]
#[command(version)]
#[command(
    long_about = "qa-forge runs a two-stage (planner -> solver) question answering pipeline against a fixed evaluation set, turns the outcome into a fitness score, and evolves the pipeline configuration with an LLM.\n\nExample usage:\n  qa-forge bench --config configs/agent.yaml --verbose\n  qa-forge evolve --config configs/agent.yaml --iterations 8 --output best_config.yaml"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the benchmark for one agent configuration.
    Bench(BenchArgs),

    /// Score a candidate configuration file and print its fitness as JSON.
    Score(ScoreArgs),

    /// Evolve an agent configuration and save the best one found.
    Evolve(EvolveArgs),
}

/// Connection settings for the completion API.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// API key (can also be set via OPENAI_API_KEY).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "OPENAI_API_BASE", default_value = OPENAI_BASE_URL)]
    pub api_base: String,
}

/// Arguments for the bench command.
#[derive(Parser, Debug)]
pub struct BenchArgs {
    /// Agent configuration file (YAML or JSON). Defaults to the built-in configuration.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Evaluation set file (YAML or JSON). Defaults to the built-in set.
    #[arg(short = 'e', long)]
    pub eval_set: Option<PathBuf>,

    /// Override the model backing both stages.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Only evaluate the first N items.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Print every question, plan and answer.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Output the report as JSON to stdout instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Also write the JSON report to this file.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub api: ApiArgs,
}

impl BenchArgs {
    /// Header and per-question transcripts go to stdout only in verbose,
    /// non-JSON mode. Otherwise only the final summary is printed.
    fn prints_transcript(&self) -> bool {
        self.verbose && !self.json
    }
}

/// Arguments for the score command.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Candidate configuration file (YAML or JSON).
    #[arg(long)]
    pub candidate: PathBuf,

    /// Evaluation set file (YAML or JSON). Defaults to the built-in set.
    #[arg(short = 'e', long)]
    pub eval_set: Option<PathBuf>,

    #[command(flatten)]
    pub api: ApiArgs,
}

/// Arguments for the evolve command.
#[derive(Parser, Debug)]
pub struct EvolveArgs {
    /// Seed agent configuration (YAML or JSON). Defaults to the built-in configuration.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Evaluation set file (YAML or JSON). Defaults to the built-in set.
    #[arg(short = 'e', long)]
    pub eval_set: Option<PathBuf>,

    /// Number of mutation rounds (overrides EVOLVE_MAX_ITERATIONS).
    #[arg(short = 'i', long)]
    pub iterations: Option<usize>,

    /// Model proposing mutations; repeat to rotate between several (overrides EVOLVE_MODELS).
    #[arg(long = "evolution-model")]
    pub evolution_models: Vec<String>,

    /// Where to save the best configuration (overrides EVOLVE_OUTPUT_PATH).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Output the outcome as JSON to stdout instead of a summary.
    #[arg(short = 'j', long)]
    pub json: bool,

    #[command(flatten)]
    pub api: ApiArgs,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Bench(args) => run_bench_command(args).await,
        Commands::Score(args) => run_score_command(args).await,
        Commands::Evolve(args) => run_evolve_command(args).await,
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Build the completion client. A missing API key is fatal.
fn build_llm_client(api: &ApiArgs, default_model: &str) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = api
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!("OPENAI_API_KEY not found. Please provide --api-key or set OPENAI_API_KEY.")
        })?;

    let client = OpenAiClient::new(api_key, api.api_base.clone(), default_model)
        .map_err(|e| anyhow::anyhow!("Failed to initialize LLM client: {}", e))?;

    info!(
        api_base = %client.api_base(),
        api_key = %client.api_key_masked(),
        model = %default_model,
        "Using OpenAI-compatible completion API"
    );
    Ok(Arc::new(client))
}

fn load_agent_config(path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    match path {
        Some(path) => AgentConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load agent config {}: {}", path.display(), e)),
        None => Ok(AgentConfig::default()),
    }
}

fn load_eval_set(path: Option<&Path>) -> anyhow::Result<EvaluationSet> {
    match path {
        Some(path) => EvaluationSet::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load evaluation set {}: {}", path.display(), e)),
        None => Ok(EvaluationSet::builtin()),
    }
}

fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write output file {}: {}", path.display(), e))?;
    info!(path = %path.display(), "Results written to file");
    Ok(())
}

// ============================================================================
// Bench Command Implementation
// ============================================================================

async fn run_bench_command(args: BenchArgs) -> anyhow::Result<()> {
    let mut config = load_agent_config(args.config.as_deref())?;
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }

    let mut eval_set = load_eval_set(args.eval_set.as_deref())?;
    if let Some(limit) = args.limit {
        eval_set = eval_set.truncated(limit);
    }

    let llm_client = build_llm_client(&args.api, &config.model)?;
    let runner = BenchmarkRunner::new(llm_client);

    info!(
        model = %config.model,
        planner = config.use_planner,
        questions = eval_set.len(),
        grading = %eval_set.match_mode,
        "Starting benchmark"
    );
    if args.prints_transcript() {
        println!("\n🔬 QA Benchmark");
        println!("===============");
        println!("Model: {}", config.model);
        println!("Planner: {}", if config.use_planner { "enabled" } else { "disabled" });
        println!("Questions: {}", eval_set.len());
        println!("Grading: {}", eval_set.match_mode);
        println!();
    }

    let report = runner.run(&config, &eval_set, args.prints_transcript()).await?;

    let json_output = serde_json::to_string_pretty(&report)
        .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
    if let Some(path) = &args.output {
        write_output(path, &json_output)?;
    }

    if args.json {
        println!("{}", json_output);
    } else {
        print_bench_summary(&report);
    }

    Ok(())
}

fn print_bench_summary(report: &BenchmarkReport) {
    let score = FitnessScore::from_success_rate(report.success_rate);

    println!("{}", "=".repeat(50));
    println!("📊 Benchmark Summary");
    println!("{}", "=".repeat(50));
    println!("Run: {}", report.run_id);
    println!("Questions: {}", report.num_examples);
    println!("Passed: {}", report.passed_count);
    println!("Failed: {}", report.failed_count());
    let errored = report.errored().count();
    if errored > 0 {
        println!("  of which errored: {}", errored);
    }
    println!("Success rate: {:.1}%", report.success_rate * 100.0);
    println!("Combined score: {:.3}", score.combined_score);
    println!("Tokens: {}", report.usage.total_tokens);
    println!("Duration: {}ms", report.duration_ms);
}

// ============================================================================
// Score Command Implementation
// ============================================================================

async fn run_score_command(args: ScoreArgs) -> anyhow::Result<()> {
    let source = fs::read_to_string(&args.candidate).map_err(|e| {
        anyhow::anyhow!("Failed to read candidate {}: {}", args.candidate.display(), e)
    })?;
    let eval_set = load_eval_set(args.eval_set.as_deref())?;

    let llm_client = build_llm_client(&args.api, DEFAULT_MODEL)?;
    let scorer = Scorer::new(eval_set);
    let score = scorer.score_source(llm_client, &source).await;

    println!("{}", serde_json::to_string_pretty(&score)?);
    Ok(())
}

// ============================================================================
// Evolve Command Implementation
// ============================================================================

/// JSON output structure for an evolution run.
#[derive(Debug, Clone, Serialize)]
pub struct EvolveOutput {
    /// Score of the seed configuration.
    pub initial_score: FitnessScore,
    /// Score of the best configuration.
    pub best_score: FitnessScore,
    /// Where the best configuration was written, if it was.
    pub saved_to: Option<PathBuf>,
    /// The best configuration.
    pub best_config: AgentConfig,
    /// One record per mutation round.
    pub history: Vec<IterationRecord>,
}

async fn run_evolve_command(args: EvolveArgs) -> anyhow::Result<()> {
    let mut evolution_config = EvolutionConfig::from_env()?;
    if let Some(iterations) = args.iterations {
        evolution_config = evolution_config.with_max_iterations(iterations);
    }
    if !args.evolution_models.is_empty() {
        evolution_config = evolution_config.with_models(args.evolution_models.clone());
    }
    if let Some(output) = &args.output {
        evolution_config = evolution_config.with_output_path(output.clone());
    }
    evolution_config.validate()?;

    let seed = load_agent_config(args.config.as_deref())?;
    let eval_set = load_eval_set(args.eval_set.as_deref())?;

    let llm_client = build_llm_client(&args.api, &seed.model)?;
    let mutator = Arc::new(LlmMutator::new(llm_client.clone(), &evolution_config));
    let output_path = evolution_config.output_path.clone();
    let evolution = Evolution::new(llm_client, mutator, Scorer::new(eval_set), evolution_config);

    if !args.json {
        println!("\n🧬 Evolution");
        println!("============");
        println!("Iterations: {}", evolution.config().max_iterations);
        println!("Evolution models: {}", evolution.config().models.join(", "));
        println!();
    }

    let outcome = evolution.run(&seed).await?;
    let saved = persist_best(&outcome, &output_path)?;
    let saved_to = saved.then(|| output_path.clone());

    if args.json {
        let output = EvolveOutput {
            initial_score: outcome.initial_score,
            best_score: outcome.best_score,
            saved_to,
            best_config: outcome.best_config,
            history: outcome.history,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for record in &outcome.history {
        match (&record.score, &record.error) {
            (Some(score), _) => println!(
                "  {} iteration {}: score {:.3}",
                if record.accepted { "✓" } else { "·" },
                record.iteration,
                score.score
            ),
            (None, Some(error)) => println!("  ✗ iteration {}: {}", record.iteration, error),
            (None, None) => println!("  ✗ iteration {}", record.iteration),
        }
    }

    println!("\nEvolution finished.");
    println!("Initial score: {:.3}", outcome.initial_score.score);
    println!("Best score found: {:.3}", outcome.best_score.score);
    match saved_to {
        Some(path) => println!("Saved best configuration to {}", path.display()),
        None => println!("No best configuration to save."),
    }

    Ok(())
}
