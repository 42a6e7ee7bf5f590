use crate::catalog::{CapabilityIndex, RetrievedApi};
use crate::orchestration::error::{ModelStage, OrchestratorError};
use crate::orchestration::prompts::{render, PRODUCER_SELECTOR_TEMPLATE, ROOT_SELECTOR_TEMPLATE};
use crate::provider::{extract_json_object, is_none_reply, CompletionRequest, LanguageModel};
use serde::{Deserialize, Serialize};

/// A selected API: its name and the locator of its documentation.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub api_name: String,
    pub data_source: String,
}

impl PartialEq for ApiDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.api_name == other.api_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Found(ApiDescriptor),
    NotFound,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SelectionReply {
    #[serde(default, alias = "name", alias = "api")]
    api_name: Option<String>,
    #[serde(default, alias = "source")]
    data_source: Option<String>,
}

/// Outcome of a selection attempt plus how many invalid replies were retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResolution {
    pub outcome: SelectionOutcome,
    pub candidates: Vec<String>,
    pub retries_used: u32,
}

/// RootSelector and SubSelector: retrieval, one model call per attempt, reply validation.
pub struct ApiSelector<'a> {
    model: &'a dyn LanguageModel,
    index: &'a dyn CapabilityIndex,
    max_retries: u32,
}

impl<'a> ApiSelector<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        index: &'a dyn CapabilityIndex,
        max_retries: u32,
    ) -> Self {
        Self {
            model,
            index,
            max_retries,
        }
    }

    /// Chooses the API that carries out a plan step.
    pub fn select_root(
        &self,
        plan_step: &str,
        top_k: usize,
    ) -> Result<SelectionResolution, OrchestratorError> {
        let candidates = self.index.retrieve(plan_step, top_k)?;
        let context = render_candidates(&candidates);
        let prompt = render(
            ROOT_SELECTOR_TEMPLATE,
            &[("candidates", &context), ("instruction", plan_step)],
        )?;
        self.select_from(ModelStage::RootSelector, &prompt, candidates)
    }

    /// Chooses an API whose output provides `argument`.
    pub fn select_producer(
        &self,
        argument: &str,
        top_k: usize,
    ) -> Result<SelectionResolution, OrchestratorError> {
        let candidates = self.index.retrieve(argument, top_k)?;
        let context = render_candidates(&candidates);
        let prompt = render(
            PRODUCER_SELECTOR_TEMPLATE,
            &[("argument", argument), ("candidates", &context)],
        )?;
        self.select_from(ModelStage::SubSelector, &prompt, candidates)
    }

    fn select_from(
        &self,
        stage: ModelStage,
        prompt: &str,
        candidates: Vec<RetrievedApi>,
    ) -> Result<SelectionResolution, OrchestratorError> {
        let names = candidates
            .iter()
            .map(|candidate| candidate.api_name.clone())
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Ok(SelectionResolution {
                outcome: SelectionOutcome::NotFound,
                candidates: names,
                retries_used: 0,
            });
        }

        let request = CompletionRequest::new(prompt);
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempt = 0_u32;
        while attempt < max_attempts {
            let raw = self
                .model
                .complete(&request)
                .map_err(OrchestratorError::model(stage))?;
            if let Ok(outcome) = parse_selection_reply(&raw, &candidates) {
                return Ok(SelectionResolution {
                    outcome,
                    candidates: names,
                    retries_used: attempt,
                });
            }
            attempt += 1;
        }

        Ok(SelectionResolution {
            outcome: SelectionOutcome::NotFound,
            candidates: names,
            retries_used: self.max_retries,
        })
    }
}

pub fn render_candidates(candidates: &[RetrievedApi]) -> String {
    if candidates.is_empty() {
        return "No similar API found!".to_string();
    }
    candidates
        .iter()
        .map(|candidate| {
            format!(
                "Next API: {}\n{}\nSource: {}\n",
                candidate.api_name,
                candidate.text.trim(),
                candidate.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses a selector reply and validates it against the retrieved candidates.
///
/// `None` replies and a JSON `api_name` of `None` mean nothing fits. A named API must be one of
/// the candidates (matched by name, then by source); its locator always comes from the
/// candidate. A bare API name without JSON is accepted when it names a candidate.
pub fn parse_selection_reply(
    raw: &str,
    candidates: &[RetrievedApi],
) -> Result<SelectionOutcome, String> {
    if is_none_reply(raw) {
        return Ok(SelectionOutcome::NotFound);
    }

    let reply = match extract_json_object(raw) {
        Some(object) => serde_json::from_str::<SelectionReply>(object)
            .map_err(|err| format!("selector reply is not valid json: {err}"))?,
        None => SelectionReply {
            api_name: Some(raw.trim().trim_matches('"').to_string()),
            data_source: None,
        },
    };

    let name = reply
        .api_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let Some(name) = name else {
        return Err("selector reply has no api_name".to_string());
    };
    if is_none_reply(name) {
        return Ok(SelectionOutcome::NotFound);
    }

    let source = reply.data_source.as_deref().map(str::trim);
    let candidate = candidates
        .iter()
        .find(|candidate| candidate.api_name == name)
        .or_else(|| {
            source.and_then(|source| {
                candidates
                    .iter()
                    .find(|candidate| candidate.source == source)
            })
        })
        .ok_or_else(|| format!("api `{name}` is not among the retrieved candidates"))?;

    Ok(SelectionOutcome::Found(ApiDescriptor {
        api_name: candidate.api_name.clone(),
        data_source: candidate.source.clone(),
    }))
}
