use crate::catalog::IndexError;
use crate::executor::ExecutorError;
use crate::provider::ProviderError;

/// Which model-backed component was talking to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStage {
    Planner,
    RootSelector,
    SubSelector,
    ArgumentResolver,
}

impl ModelStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::RootSelector => "root_selector",
            Self::SubSelector => "sub_selector",
            Self::ArgumentResolver => "argument_resolver",
        }
    }
}

impl std::fmt::Display for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Faults that end a run without an outcome. Selection failures and dependency cycles are not
/// errors; they are aborted outcomes.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("language model call failed in {stage}: {source}")]
    Model {
        stage: ModelStage,
        #[source]
        source: ProviderError,
    },
    #[error("capability index failure: {0}")]
    Index(#[from] IndexError),
    #[error("call execution failure: {0}")]
    Executor(#[from] ExecutorError),
    #[error("prompt render failed: {reason}")]
    PromptRender { reason: String },
    #[error("failed to encode artifact: {0}")]
    ArtifactEncode(#[source] serde_json::Error),
    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    pub(crate) fn model(stage: ModelStage) -> impl FnOnce(ProviderError) -> Self {
        move |source| Self::Model { stage, source }
    }
}
