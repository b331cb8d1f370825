//! The two-stage question answering pipeline.
//!
//! ```text
//! question ──▶ [planner] ──plan──▶ [solver] ──▶ answer
//!                  ▲ skipped when use_planner = false
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::config::{AgentConfig, Stage};
use super::prompts::render_template;
use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message, Usage};

/// Failure of a single stage call.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} prompt failed to render: {message}")]
    Render { stage: Stage, message: String },

    #[error("{stage} completion failed: {source}")]
    Completion {
        stage: Stage,
        #[source]
        source: LlmError,
    },
}

impl StageError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Render { stage, .. } | StageError::Completion { stage, .. } => *stage,
        }
    }
}

/// Output of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Planner output, `None` when the planner is disabled.
    pub plan: Option<String>,
    /// Solver output.
    pub answer: String,
    /// Tokens consumed by both calls.
    pub usage: Usage,
}

/// A pipeline run that stopped at one of its stages.
#[derive(Debug)]
pub struct PipelineFailure {
    /// Plan, when the planner succeeded before the solver failed.
    pub plan: Option<String>,
    /// What went wrong.
    pub error: StageError,
    /// Tokens consumed before the failure.
    pub usage: Usage,
}

/// Runs planner and solver calls against an LLM provider.
#[derive(Clone)]
pub struct QaPipeline {
    provider: Arc<dyn LlmProvider>,
}

impl QaPipeline {
    /// Create a pipeline backed by `provider`.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Answer one question: planner (if enabled), then solver.
    pub async fn run(
        &self,
        config: &AgentConfig,
        question: &str,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let mut usage = Usage::default();

        let plan = if config.use_planner {
            match self.call_stage(config, Stage::Planner, question, None, &mut usage).await {
                Ok(plan) => Some(plan),
                Err(error) => {
                    return Err(PipelineFailure {
                        plan: None,
                        error,
                        usage,
                    })
                }
            }
        } else {
            None
        };

        match self
            .call_stage(config, Stage::Solver, question, plan.as_deref(), &mut usage)
            .await
        {
            Ok(answer) => Ok(PipelineOutput {
                plan,
                answer,
                usage,
            }),
            Err(error) => Err(PipelineFailure { plan, error, usage }),
        }
    }

    async fn call_stage(
        &self,
        config: &AgentConfig,
        stage: Stage,
        question: &str,
        plan: Option<&str>,
        usage: &mut Usage,
    ) -> Result<String, StageError> {
        let stage_config = config.stage(stage);

        let user_content = render_template(stage_config.template(stage), question, plan)
            .map_err(|message| StageError::Render { stage, message })?;

        let mut messages = Vec::with_capacity(2);
        if !stage_config.system_prompt.trim().is_empty() {
            messages.push(Message::system(&stage_config.system_prompt));
        }
        messages.push(Message::user(user_content));

        let mut request = GenerationRequest::new(config.model_for(stage), messages)
            .with_max_tokens(stage_config.effective_max_tokens(stage));
        if let Some(temperature) = stage_config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self
            .provider
            .generate(request)
            .await
            .map_err(|source| StageError::Completion { stage, source })?;
        *usage += response.usage;

        let text = response
            .completion_text()
            .map_err(|source| StageError::Completion { stage, source })?;

        tracing::debug!(%stage, chars = text.len(), "Stage completed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::config::StageConfig;
    use crate::llm::{Choice, GenerationResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock provider replying by stage and recording every request.
    struct MockLlmProvider {
        plan: Result<String, ()>,
        answer: Result<String, ()>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl MockLlmProvider {
        fn new(plan: Result<&str, ()>, answer: Result<&str, ()>) -> Self {
            Self {
                plan: plan.map(str::to_string),
                answer: answer.map(str::to_string),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            let is_planner = request
                .system_content()
                .is_some_and(|s| s.contains("planning"));
            self.requests.lock().expect("lock poisoned").push(request);

            let reply = if is_planner { &self.plan } else { &self.answer };
            let content = reply
                .clone()
                .map_err(|_| LlmError::RequestFailed("connection error: simulated".to_string()))?;

            Ok(GenerationResponse {
                id: "mock".to_string(),
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
            })
        }
    }

    #[tokio::test]
    async fn test_planner_then_solver() {
        let provider = Arc::new(MockLlmProvider::new(Ok("1. Recall capitals."), Ok("Paris")));
        let pipeline = QaPipeline::new(provider.clone());

        let output = pipeline
            .run(&AgentConfig::default(), "What is the capital of France?")
            .await
            .expect("pipeline succeeds");

        assert_eq!(output.plan.as_deref(), Some("1. Recall capitals."));
        assert_eq!(output.answer, "Paris");
        assert_eq!(output.usage.total_tokens, 30);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].max_tokens, Some(128));
        assert_eq!(requests[0].user_content(), Some("Question: What is the capital of France?"));
        assert_eq!(requests[1].max_tokens, Some(64));
        assert_eq!(
            requests[1].user_content(),
            Some("Question: What is the capital of France?\nPlan: 1. Recall capitals.")
        );
    }

    #[tokio::test]
    async fn test_planner_disabled_makes_one_call() {
        let provider = Arc::new(MockLlmProvider::new(Ok("unused"), Ok("Rome")));
        let pipeline = QaPipeline::new(provider.clone());
        let config = AgentConfig::default().with_planner(false);

        let output = pipeline
            .run(&config, "What is the capital of Italy?")
            .await
            .expect("pipeline succeeds");

        assert!(output.plan.is_none());
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_content(), Some("Question: What is the capital of Italy?"));
    }

    #[tokio::test]
    async fn test_stage_overrides_reach_request() {
        let provider = Arc::new(MockLlmProvider::new(Ok("plan"), Ok("answer")));
        let pipeline = QaPipeline::new(provider.clone());
        let config = AgentConfig::default().with_planner(false).with_solver_stage(
            StageConfig::new("")
                .with_model("gpt-4o")
                .with_temperature(0.0)
                .with_user_template("Q={{ question }}"),
        );

        pipeline.run(&config, "2+2?").await.expect("pipeline succeeds");

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.0));
        // Blank system prompt is left out of the conversation.
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.user_content(), Some("Q=2+2?"));
    }

    #[tokio::test]
    async fn test_planner_failure_stops_before_solver() {
        let provider = Arc::new(MockLlmProvider::new(Err(()), Ok("Paris")));
        let pipeline = QaPipeline::new(provider.clone());

        let failure = pipeline
            .run(&AgentConfig::default(), "What is the capital of France?")
            .await
            .expect_err("planner failure propagates");

        assert_eq!(failure.error.stage(), Stage::Planner);
        assert!(failure.plan.is_none());
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_solver_failure_keeps_plan() {
        let provider = Arc::new(MockLlmProvider::new(Ok("1. Think."), Err(())));
        let pipeline = QaPipeline::new(provider);

        let failure = pipeline
            .run(&AgentConfig::default(), "What is the capital of France?")
            .await
            .expect_err("solver failure propagates");

        assert_eq!(failure.error.stage(), Stage::Solver);
        assert_eq!(failure.plan.as_deref(), Some("1. Think."));
        assert_eq!(failure.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_blank_answer_is_a_failure() {
        let provider = Arc::new(MockLlmProvider::new(Ok("plan"), Ok("   ")));
        let pipeline = QaPipeline::new(provider);
        let config = AgentConfig::default().with_planner(false);

        let failure = pipeline.run(&config, "?").await.expect_err("blank answer fails");
        assert!(matches!(
            failure.error,
            StageError::Completion {
                source: LlmError::EmptyResponse,
                ..
            }
        ));
    }
}
