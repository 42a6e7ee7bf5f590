use super::{ApiCall, CallExecutor, CallOutcome, ExecutorError};
use crate::config::ExecutorConfig;
use serde_json::Value;
use std::time::Duration;

/// Executes calls as `POST {base_url}/{api_name}` with the arguments as the JSON body.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpExecutor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.base_url.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn endpoint(&self, api_name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(api_name)
        )
    }
}

impl CallExecutor for HttpExecutor {
    fn run(&self, call: &ApiCall) -> Result<CallOutcome, ExecutorError> {
        let url = self.endpoint(&call.api_name);
        let body = Value::Object(call.arguments.clone());
        match self.agent.post(&url).send_json(body) {
            Ok(response) => {
                let value: Value =
                    response
                        .into_json()
                        .map_err(|err| ExecutorError::MalformedResponse {
                            api_name: call.api_name.clone(),
                            reason: err.to_string(),
                        })?;
                CallOutcome::from_response(&call.api_name, value)
            }
            Err(ureq::Error::Status(code, response)) => {
                let raw = response.into_string().unwrap_or_default();
                Ok(error_status_outcome(&call.api_name, i64::from(code), &raw))
            }
            Err(ureq::Error::Transport(transport)) => Err(ExecutorError::Transport {
                api_name: call.api_name.clone(),
                reason: transport.to_string(),
            }),
        }
    }
}

// Error statuses are outcomes for the planner, not faults: prefer a JSON body's own status and
// error, fall back to the http code and raw body. A body claiming success never masks the code.
fn error_status_outcome(api_name: &str, code: i64, raw: &str) -> CallOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if let Ok(mut outcome) = CallOutcome::from_response(api_name, value.clone()) {
            if outcome.is_success() {
                outcome.status = code;
            }
            return outcome;
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return CallOutcome::failure(code, error);
        }
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        CallOutcome::failure(code, format!("http {code}"))
    } else {
        CallOutcome::failure(code, trimmed)
    }
}
