use super::{resolve_config_path, ConfigError, Settings};
use std::path::Path;

/// Resolves and reads the config file, lets `adjust` apply caller overrides, then validates
/// the adjusted settings.
pub fn load_settings<F>(explicit: Option<&Path>, adjust: F) -> Result<Settings, ConfigError>
where
    F: FnOnce(&mut Settings),
{
    let path = resolve_config_path(explicit)?;
    let mut settings = Settings::from_path(&path)?;
    adjust(&mut settings);
    settings.validate()?;
    Ok(settings)
}
