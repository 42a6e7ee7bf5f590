pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::load_settings;
pub use paths::{resolve_config_path, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE_NAME};
pub use settings::{
    CatalogConfig, ExecutorConfig, ExecutorKind, LlmConfig, OutputConfig, RetryConfig,
    RunLimitsConfig, Settings,
};
