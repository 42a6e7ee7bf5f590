use crate::shared::{retry_with_policy, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod fixture;
pub mod http;

pub use fixture::FixtureExecutor;
pub use http::HttpExecutor;

pub const SUCCESS_STATUS: i64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("executor transport failure for `{api_name}`: {reason}")]
    Transport { api_name: String, reason: String },
    #[error("executor response for `{api_name}` is malformed: {reason}")]
    MalformedResponse { api_name: String, reason: String },
    #[error("failed to read fixtures {path}: {source}")]
    FixtureRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fixtures yaml in {path}: {source}")]
    FixtureParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ExecutorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// One concrete call: the API name and its resolved argument values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    pub api_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Status-tagged execution result. Keys other than `status`, `message` and `error` are output
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub status: i64,
    pub message: Option<String>,
    pub error: Option<String>,
    pub outputs: Map<String, Value>,
}

impl CallOutcome {
    pub fn success(message: impl Into<String>, outputs: Map<String, Value>) -> Self {
        Self {
            status: SUCCESS_STATUS,
            message: Some(message.into()),
            error: None,
            outputs,
        }
    }

    pub fn failure(status: i64, error: impl Into<String>) -> Self {
        Self {
            status,
            message: None,
            error: Some(error.into()),
            outputs: Map::new(),
        }
    }

    pub fn from_response(api_name: &str, response: Value) -> Result<Self, ExecutorError> {
        let Value::Object(mut fields) = response else {
            return Err(ExecutorError::MalformedResponse {
                api_name: api_name.to_string(),
                reason: "response is not a json object".to_string(),
            });
        };
        let status = fields
            .remove("status")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| ExecutorError::MalformedResponse {
                api_name: api_name.to_string(),
                reason: "missing integer `status`".to_string(),
            })?;
        let message = fields.remove("message").map(value_to_text);
        let error = fields.remove("error").map(value_to_text);
        Ok(Self {
            status,
            message,
            error,
            outputs: fields,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// The natural-language observation handed back to the planner.
    pub fn observation(&self, api_name: &str) -> String {
        if self.is_success() {
            return self
                .message
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("Successfully called {api_name}."));
        }
        format!(
            "Unsuccessful attempt, cause: {}!",
            self.error.as_deref().unwrap_or("unknown")
        )
    }
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Executes one API call.
pub trait CallExecutor {
    fn run(&self, call: &ApiCall) -> Result<CallOutcome, ExecutorError>;
}

/// Retries transport failures of an inner executor. Status-tagged failures are outcomes and
/// are never retried here.
pub struct RetryingExecutor<E> {
    inner: E,
    retry: RetryPolicy,
}

impl<E: CallExecutor> RetryingExecutor<E> {
    pub fn new(inner: E, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }
}

impl<E: CallExecutor> CallExecutor for RetryingExecutor<E> {
    fn run(&self, call: &ApiCall) -> Result<CallOutcome, ExecutorError> {
        retry_with_policy(
            &self.retry,
            |_| self.inner.run(call),
            ExecutorError::is_retryable,
        )
    }
}
