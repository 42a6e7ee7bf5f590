use revchain::config::{
    load_settings, resolve_config_path, ConfigError, ExecutorKind, CONFIG_ENV_VAR,
};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn load_settings_reads_and_validates_explicit_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("custom.yaml");
    fs::write(
        &path,
        r#"
query: Summarize my P0 issues
llm:
  model: gpt-4o-mini
  request_delay_ms: 250
executor:
  kind: http
  base_url: http://localhost:8080/api
run:
  max_iterations: 4
"#,
    )
    .expect("write");

    let settings = load_settings(Some(&path), |_| {}).expect("load");
    assert_eq!(settings.query.as_deref(), Some("Summarize my P0 issues"));
    assert_eq!(settings.llm.model, "gpt-4o-mini");
    assert_eq!(settings.llm.request_delay_ms, 250);
    assert_eq!(settings.executor.kind, ExecutorKind::Http);
    assert_eq!(settings.run.max_iterations, 4);
    assert_eq!(settings.catalog.docs_path, dir.path().join("api_docs"));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempdir().expect("tempdir");
    let err = load_settings(Some(&dir.path().join("absent.yaml")), |_| {}).expect_err("missing");
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn invalid_values_fail_validation() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("revchain.yaml");
    fs::write(
        &path,
        r#"
llm:
  temperature: 3.5
executor:
  fixtures_path: fixtures.yaml
"#,
    )
    .expect("write");
    let err = load_settings(Some(&path), |_| {}).expect_err("temperature out of range");
    assert!(matches!(err, ConfigError::Settings(_)));
    assert!(err.to_string().contains("llm.temperature"));
}

#[test]
fn explicit_path_wins_over_lookup() {
    let explicit = Path::new("/etc/revchain/custom.yaml");
    assert_eq!(
        resolve_config_path(Some(explicit)).expect("resolve"),
        explicit.to_path_buf()
    );
}

#[test]
fn overrides_are_applied_before_validation() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("revchain.yaml");
    fs::write(&path, "executor:\n  kind: fixture\n").expect("write");

    let err = load_settings(Some(&path), |_| {}).expect_err("fixture kind needs a path");
    assert!(matches!(err, ConfigError::Settings(_)));

    let fixtures = dir.path().join("fixtures.yaml");
    let settings = load_settings(Some(&path), |settings| {
        settings.executor.fixtures_path = Some(fixtures.clone());
    })
    .expect("override satisfies validation");
    assert_eq!(settings.executor.fixtures_path, Some(fixtures));
}

#[test]
fn env_var_is_used_when_no_explicit_path_is_given() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("from-env.yaml");
    fs::write(&path, "query: Who am I\n").expect("write");
    let old_value = std::env::var_os(CONFIG_ENV_VAR);
    std::env::set_var(CONFIG_ENV_VAR, &path);

    let resolved = resolve_config_path(None);
    let loaded = load_settings(None, |_| {});

    if let Some(value) = old_value {
        std::env::set_var(CONFIG_ENV_VAR, value);
    } else {
        std::env::remove_var(CONFIG_ENV_VAR);
    }
    assert_eq!(resolved.expect("resolve"), path);
    assert_eq!(loaded.expect("load").query.as_deref(), Some("Who am I"));
}
