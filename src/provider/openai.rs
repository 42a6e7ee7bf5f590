use crate::config::LlmConfig;
use crate::provider::{CompletionRequest, LanguageModel, ProviderError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// OpenAI rejects more than four stop sequences.
const MAX_STOP_SEQUENCES: usize = 4;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        Ok(Self::new(config, api_key))
    }

    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build();
        Self {
            agent,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl LanguageModel for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let stop = (!request.stop.is_empty())
            .then(|| &request.stop[..request.stop.len().min(MAX_STOP_SEQUENCES)]);
        let body = ChatCompletionBody {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stop,
        };
        let payload =
            serde_json::to_value(&body).map_err(|err| ProviderError::ParseFailure {
                reason: format!("failed to encode request: {err}"),
            })?;

        let response = match self
            .agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(payload)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(ProviderError::Status {
                    code,
                    body: response.into_string().unwrap_or_default(),
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ProviderError::Transport(transport.to_string()))
            }
        };

        let parsed: ChatCompletionResponse =
            response
                .into_json()
                .map_err(|err| ProviderError::ParseFailure {
                    reason: format!("invalid completion body: {err}"),
                })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseFailure {
                reason: "completion returned no message content".to_string(),
            })
    }
}
