use super::paths::resolve_relative;
use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_timeout_seconds() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_docs_path() -> PathBuf {
    PathBuf::from("api_docs")
}

fn default_root_top_k() -> usize {
    10
}

fn default_producer_top_k() -> usize {
    5
}

fn default_executor_timeout_seconds() -> u64 {
    30
}

fn default_max_iterations() -> u32 {
    15
}

fn default_max_execution_time_seconds() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_selection_max_retries() -> u32 {
    1
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("output/output.json")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs/run.log")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub run: RunLimitsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Pause before every model request. Rate-limit pacing only.
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_llm_timeout_seconds(),
            request_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default = "default_docs_path")]
    pub docs_path: PathBuf,
    #[serde(default = "default_root_top_k")]
    pub root_top_k: usize,
    #[serde(default = "default_producer_top_k")]
    pub producer_top_k: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            docs_path: default_docs_path(),
            root_top_k: default_root_top_k(),
            producer_top_k: default_producer_top_k(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    Http,
    #[default]
    Fixture,
}

impl ExecutorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Fixture => "fixture",
        }
    }
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    pub kind: ExecutorKind,
    pub base_url: Option<String>,
    pub fixtures_path: Option<PathBuf>,
    #[serde(default = "default_executor_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            base_url: None,
            fixtures_path: None,
            timeout_seconds: default_executor_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunLimitsConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_execution_time_seconds")]
    pub max_execution_time_seconds: u64,
    #[serde(default = "default_true")]
    pub enforce_limits: bool,
    #[serde(default = "default_selection_max_retries")]
    pub selection_max_retries: u32,
}

impl Default for RunLimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_execution_time_seconds: default_max_execution_time_seconds(),
            enforce_limits: true,
            selection_max_retries: default_selection_max_retries(),
        }
    }
}

impl RunLimitsConfig {
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_secs(self.max_execution_time_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            log_path: default_log_path(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query: None,
            llm: LlmConfig::default(),
            retry: RetryConfig::default(),
            catalog: CatalogConfig::default(),
            executor: ExecutorConfig::default(),
            run: RunLimitsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Settings {
    /// Parses a YAML settings file. Relative paths inside it are anchored to the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        settings.anchor_paths(base_dir);
        Ok(settings)
    }

    pub fn anchor_paths(&mut self, base_dir: &Path) {
        self.catalog.docs_path = resolve_relative(base_dir, &self.catalog.docs_path);
        if let Some(fixtures) = self.executor.fixtures_path.take() {
            self.executor.fixtures_path = Some(resolve_relative(base_dir, &fixtures));
        }
        self.output.artifact_path = resolve_relative(base_dir, &self.output.artifact_path);
        self.output.log_path = resolve_relative(base_dir, &self.output.log_path);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Settings("llm.model must be non-empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Settings(
                "llm.temperature must be within 0.0..=2.0".to_string(),
            ));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "llm.timeout_seconds must be >= 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Settings(
                "retry.max_attempts must be >= 1".to_string(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::Settings(
                "retry.max_backoff_ms must be >= retry.initial_backoff_ms".to_string(),
            ));
        }
        if self.catalog.root_top_k == 0 || self.catalog.producer_top_k == 0 {
            return Err(ConfigError::Settings(
                "catalog.root_top_k and catalog.producer_top_k must be >= 1".to_string(),
            ));
        }
        match self.executor.kind {
            ExecutorKind::Http => {
                let base_url = self.executor.base_url.as_deref().unwrap_or_default();
                if base_url.trim().is_empty() {
                    return Err(ConfigError::Settings(
                        "executor.base_url is required when executor.kind=http".to_string(),
                    ));
                }
            }
            ExecutorKind::Fixture => {
                if self.executor.fixtures_path.is_none() {
                    return Err(ConfigError::Settings(
                        "executor.fixtures_path is required when executor.kind=fixture"
                            .to_string(),
                    ));
                }
            }
        }
        if self.executor.timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "executor.timeout_seconds must be >= 1".to_string(),
            ));
        }
        if self.run.enforce_limits {
            if self.run.max_iterations == 0 {
                return Err(ConfigError::Settings(
                    "run.max_iterations must be >= 1 when run.enforce_limits=true".to_string(),
                ));
            }
            if self.run.max_execution_time_seconds == 0 {
                return Err(ConfigError::Settings(
                    "run.max_execution_time_seconds must be >= 1 when run.enforce_limits=true"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}
