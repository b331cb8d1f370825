//! Default prompts and template rendering for the two pipeline stages.
//!
//! User-message templates are rendered with Tera. The planner template sees
//! `question`; the solver template sees `question` and `plan` (an empty string
//! when the planner is disabled, so `{% if plan %}` guards work).

use tera::{Context, Tera};

/// System prompt for the planner stage.
pub const DEFAULT_PLANNER_SYSTEM_PROMPT: &str = "You are a planning assistant. Given a question, write 2-4 short \
steps that would help answer the question. Keep steps concise.";

/// System prompt for the solver stage.
pub const DEFAULT_SOLVER_SYSTEM_PROMPT: &str = "You are an intelligent assistant. Use the plan provided to answer \
the question as accurately as possible.";

/// User-message template for the planner stage.
pub const DEFAULT_PLANNER_TEMPLATE: &str = "Question: {{ question }}";

/// User-message template for the solver stage. The plan line only appears
/// when the planner produced one.
pub const DEFAULT_SOLVER_TEMPLATE: &str =
    "Question: {{ question }}{% if plan %}\nPlan: {{ plan }}{% endif %}";

/// Question used to trial-render templates during validation.
pub(crate) const SAMPLE_QUESTION: &str = "What is the capital of France?";

/// Plan used to trial-render templates during validation.
pub(crate) const SAMPLE_PLAN: &str = "1. Recall European capitals.";

/// Render a user-message template.
///
/// # Errors
///
/// Returns the flattened Tera error message when the template does not parse
/// or references an unknown variable.
pub fn render_template(template: &str, question: &str, plan: Option<&str>) -> Result<String, String> {
    let mut context = Context::new();
    context.insert("question", question);
    context.insert("plan", plan.unwrap_or(""));

    Tera::one_off(template, &context, false).map_err(|e| describe_tera_error(&e))
}

/// Tera wraps the useful message in its source chain; flatten it.
fn describe_tera_error(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_template_renders_question() {
        let rendered = render_template(DEFAULT_PLANNER_TEMPLATE, "Who painted the Mona Lisa?", None)
            .expect("renders");
        assert_eq!(rendered, "Question: Who painted the Mona Lisa?");
    }

    #[test]
    fn test_solver_template_includes_plan_when_present() {
        let rendered = render_template(
            DEFAULT_SOLVER_TEMPLATE,
            "What is the capital of Italy?",
            Some("1. Think about Italy."),
        )
        .expect("renders");
        assert_eq!(
            rendered,
            "Question: What is the capital of Italy?\nPlan: 1. Think about Italy."
        );
    }

    #[test]
    fn test_solver_template_omits_plan_when_absent() {
        let rendered =
            render_template(DEFAULT_SOLVER_TEMPLATE, "What is the capital of Italy?", None).expect("renders");
        assert_eq!(rendered, "Question: What is the capital of Italy?");

        let rendered =
            render_template(DEFAULT_SOLVER_TEMPLATE, "What is the capital of Italy?", Some(""))
                .expect("renders");
        assert_eq!(rendered, "Question: What is the capital of Italy?");
    }

    #[test]
    fn test_question_is_not_interpreted_as_template() {
        let rendered = render_template(DEFAULT_PLANNER_TEMPLATE, "What does {{ x }} mean?", None)
            .expect("renders");
        assert_eq!(rendered, "Question: What does {{ x }} mean?");
    }

    #[test]
    fn test_no_html_escaping() {
        let rendered = render_template("{{ question }}", "Is 1 < 2 & 3 > 2?", None).expect("renders");
        assert_eq!(rendered, "Is 1 < 2 & 3 > 2?");
    }

    #[test]
    fn test_invalid_template_reports_error() {
        let err = render_template("Question: {{ question", SAMPLE_QUESTION, None)
            .expect_err("unterminated tag should fail");
        assert!(!err.is_empty());

        let err = render_template("{{ unknown_variable }}", SAMPLE_QUESTION, Some(SAMPLE_PLAN))
            .expect_err("unknown variable should fail");
        assert!(err.contains("unknown_variable"));
    }
}
