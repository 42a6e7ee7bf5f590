use crate::config::Settings;
use crate::shared::{retry_with_policy, RetryPolicy};
use std::thread;
use std::time::Duration;

pub mod openai;
pub mod output_parse;

pub use openai::OpenAiClient;
pub use output_parse::{extract_json_object, is_none_reply};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("api key environment variable `{env_var}` is not set")]
    MissingApiKey { env_var: String },
    #[error("model endpoint returned http {code}: {body}")]
    Status { code: u16, body: String },
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("model output parse failure: {reason}")]
    ParseFailure { reason: String },
}

impl ProviderError {
    /// Transport faults, rate limiting and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::MissingApiKey { .. } | Self::ParseFailure { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stop: Vec::new(),
        }
    }

    pub fn with_stop(mut self, stop: impl IntoIterator<Item = String>) -> Self {
        self.stop = stop.into_iter().collect();
        self
    }
}

/// Synchronous prompt-to-text completion.
pub trait LanguageModel {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Wraps a model with a fixed pre-request delay and bounded retry of retryable faults.
pub struct PacedModel<M> {
    inner: M,
    request_delay: Duration,
    retry: RetryPolicy,
}

impl<M: LanguageModel> PacedModel<M> {
    pub fn new(inner: M, request_delay: Duration, retry: RetryPolicy) -> Self {
        Self {
            inner,
            request_delay,
            retry,
        }
    }

    pub fn from_settings(inner: M, settings: &Settings) -> Self {
        Self::new(
            inner,
            Duration::from_millis(settings.llm.request_delay_ms),
            RetryPolicy::from_config(&settings.retry),
        )
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: LanguageModel> LanguageModel for PacedModel<M> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        retry_with_policy(
            &self.retry,
            |_| {
                if !self.request_delay.is_zero() {
                    thread::sleep(self.request_delay);
                }
                self.inner.complete(request)
            },
            ProviderError::is_retryable,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FlakyModel {
        failures: RefCell<Vec<ProviderError>>,
        calls: RefCell<u32>,
    }

    impl LanguageModel for FlakyModel {
        fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            *self.calls.borrow_mut() += 1;
            match self.failures.borrow_mut().pop() {
                Some(err) => Err(err),
                None => Ok("ok".to_string()),
            }
        }
    }

    fn instant_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Transport("reset".to_string()).is_retryable());
        assert!(ProviderError::Status {
            code: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(ProviderError::Status {
            code: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::Status {
            code: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::MissingApiKey {
            env_var: "KEY".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn paced_model_retries_transport_faults() {
        let model = PacedModel::new(
            FlakyModel {
                failures: RefCell::new(vec![
                    ProviderError::Transport("a".to_string()),
                    ProviderError::Status {
                        code: 500,
                        body: String::new(),
                    },
                ]),
                calls: RefCell::new(0),
            },
            Duration::ZERO,
            instant_retry(3),
        );

        let reply = model
            .complete(&CompletionRequest::new("hi"))
            .expect("third attempt succeeds");
        assert_eq!(reply, "ok");
        assert_eq!(*model.inner().calls.borrow(), 3);
    }

    #[test]
    fn paced_model_does_not_retry_client_errors() {
        let model = PacedModel::new(
            FlakyModel {
                failures: RefCell::new(vec![ProviderError::Status {
                    code: 400,
                    body: "bad request".to_string(),
                }]),
                calls: RefCell::new(0),
            },
            Duration::ZERO,
            instant_retry(3),
        );

        let err = model
            .complete(&CompletionRequest::new("hi"))
            .expect_err("400 is final");
        assert!(err.to_string().contains("http 400"));
        assert_eq!(*model.inner().calls.borrow(), 1);
    }
}
