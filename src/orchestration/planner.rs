use crate::orchestration::error::{ModelStage, OrchestratorError};
use crate::orchestration::history::{History, OBSERVATION_PREFIX, PLAN_STEP_PREFIX};
use crate::orchestration::prompts::{render, PLANNER_EXAMPLES, PLANNER_TEMPLATE};
use crate::provider::{CompletionRequest, LanguageModel};

pub const TERMINATION_MARKER: &str = "Final Answer";
pub const OUT_OF_DOMAIN_SENTINEL: &str = "[]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerDecision {
    /// Next natural-language step, with any `Plan step N:` prefixes removed.
    Step(String),
    /// The planner wrote the termination marker. `answer` is the text after `Final Answer:`.
    Finished { text: String, answer: String },
    /// The planner judged the request out of domain.
    OutOfDomain,
}

pub struct GoalPlanner<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> GoalPlanner<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    pub fn build_prompt(
        &self,
        query: &str,
        history: &History,
    ) -> Result<String, OrchestratorError> {
        let scratchpad = history.render_scratchpad();
        render(
            PLANNER_TEMPLATE,
            &[
                ("examples", PLANNER_EXAMPLES),
                ("query", query),
                ("scratchpad", &scratchpad),
            ],
        )
    }

    /// One model call; the raw reply is classified by [`classify_plan_output`].
    pub fn plan(
        &self,
        query: &str,
        history: &History,
    ) -> Result<PlannerDecision, OrchestratorError> {
        let request = CompletionRequest::new(self.build_prompt(query, history)?)
            .with_stop(stop_sequences());
        let raw = self
            .model
            .complete(&request)
            .map_err(OrchestratorError::model(ModelStage::Planner))?;
        Ok(classify_plan_output(&raw))
    }
}

pub fn stop_sequences() -> Vec<String> {
    let observation = OBSERVATION_PREFIX.trim_end_matches(':');
    vec![format!("\n{observation}"), format!("\n\t{observation}")]
}

pub fn should_end(plan_output: &str) -> bool {
    plan_output.contains(TERMINATION_MARKER)
}

pub fn classify_plan_output(raw: &str) -> PlannerDecision {
    let text = strip_plan_step_prefixes(raw);
    if text == OUT_OF_DOMAIN_SENTINEL {
        return PlannerDecision::OutOfDomain;
    }
    if should_end(&text) {
        let answer = extract_final_answer(&text);
        return PlannerDecision::Finished { text, answer };
    }
    PlannerDecision::Step(text)
}

/// Removes every `Plan step <digits>: ` occurrence and trims the result.
pub fn strip_plan_step_prefixes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(PLAN_STEP_PREFIX) {
        let after_prefix = &rest[start + PLAN_STEP_PREFIX.len()..];
        match numbered_prefix_len(after_prefix) {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &after_prefix[len..];
            }
            None => {
                out.push_str(&rest[..start + PLAN_STEP_PREFIX.len()]);
                rest = after_prefix;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

// Length of ` <digits>: ` at the start of `text`, if present.
fn numbered_prefix_len(text: &str) -> Option<usize> {
    let after_space = text.strip_prefix(' ')?;
    let digits = after_space
        .bytes()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let after_digits = after_space[digits..].strip_prefix(": ")?;
    Some(text.len() - after_digits.len())
}

fn extract_final_answer(text: &str) -> String {
    let Some(index) = text.rfind(TERMINATION_MARKER) else {
        return String::new();
    };
    text[index + TERMINATION_MARKER.len()..]
        .trim_start_matches(':')
        .trim()
        .to_string()
}
