use crate::config::{load_settings, ConfigError, ExecutorKind, Settings};
use std::path::{Path, PathBuf};

/// Positional arguments plus `--flag value` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub positional: Vec<String>,
    values: Vec<(String, String)>,
}

impl CommandOptions {
    pub fn value(&self, flag: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(name, _)| name == flag)
            .map(|(_, value)| value.as_str())
    }

    pub fn path(&self, flag: &str) -> Option<PathBuf> {
        self.value(flag).map(PathBuf::from)
    }
}

pub fn parse_options(args: &[String], allowed: &[&str]) -> Result<CommandOptions, String> {
    let mut options = CommandOptions::default();
    let mut i = 0usize;
    while i < args.len() {
        let arg = &args[i];
        if !arg.starts_with("--") {
            options.positional.push(arg.clone());
            i += 1;
            continue;
        }
        if !allowed.contains(&arg.as_str()) {
            return Err(format!("unexpected argument `{arg}`"));
        }
        if i + 1 >= args.len() {
            return Err(format!("{arg} requires a value"));
        }
        options.values.push((arg.clone(), args[i + 1].clone()));
        i += 2;
    }
    Ok(options)
}

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

/// Loads settings from `--config` (or the default lookup), applies `--fixtures` and
/// `--output` overrides, then validates.
pub fn load_cli_settings(options: &CommandOptions) -> Result<Settings, String> {
    let config = options.path("--config");
    load_settings(config.as_deref(), |settings| apply_overrides(settings, options))
        .map_err(map_config_err)
}

pub fn apply_overrides(settings: &mut Settings, options: &CommandOptions) {
    if let Some(fixtures) = options.path("--fixtures") {
        settings.executor.kind = ExecutorKind::Fixture;
        settings.executor.fixtures_path = Some(fixtures);
    }
    if let Some(output) = options.path("--output") {
        settings.output.artifact_path = output;
    }
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_positionals_and_flags() {
        let options = parse_options(
            &args(&["find", "users", "--top-k", "3", "--top-k", "4"]),
            &["--top-k"],
        )
        .expect("parse");
        assert_eq!(options.positional, vec!["find".to_string(), "users".to_string()]);
        assert_eq!(options.value("--top-k"), Some("4"));
    }

    #[test]
    fn rejects_unknown_and_dangling_flags() {
        assert_eq!(
            parse_options(&args(&["--nope", "x"]), &["--query"]),
            Err("unexpected argument `--nope`".to_string())
        );
        assert_eq!(
            parse_options(&args(&["--query"]), &["--query"]),
            Err("--query requires a value".to_string())
        );
    }

    #[test]
    fn overrides_switch_to_fixture_executor() {
        let mut settings = Settings::default();
        settings.executor.kind = ExecutorKind::Http;
        let options = parse_options(
            &args(&["--fixtures", "f.yaml", "--output", "out.json"]),
            &["--fixtures", "--output"],
        )
        .expect("parse");
        apply_overrides(&mut settings, &options);
        assert_eq!(settings.executor.kind, ExecutorKind::Fixture);
        assert_eq!(settings.executor.fixtures_path, Some(PathBuf::from("f.yaml")));
        assert_eq!(settings.output.artifact_path, PathBuf::from("out.json"));
    }
}
