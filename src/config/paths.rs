use crate::config::ConfigError;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "REVCHAIN_CONFIG";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "revchain.yaml";

/// Resolves the config file: explicit path, then `$REVCHAIN_CONFIG`, then `./revchain.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(from_env) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(from_env));
    }
    let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectoryUnavailable)?;
    Ok(cwd.join(DEFAULT_CONFIG_FILE_NAME))
}

pub(crate) fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
