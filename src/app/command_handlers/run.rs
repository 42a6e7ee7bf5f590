use crate::app::command_support::{display_path, load_cli_settings, parse_options};
use crate::catalog::DocumentIndex;
use crate::config::{ExecutorKind, Settings};
use crate::executor::{CallExecutor, FixtureExecutor, HttpExecutor, RetryingExecutor};
use crate::orchestration::Orchestrator;
use crate::provider::{LanguageModel, OpenAiClient, PacedModel};
use crate::shared::{new_run_id, RetryPolicy, RunLog};

const RUN_FLAGS: &[&str] = &["--config", "--query", "--fixtures", "--output"];

pub fn cmd_run(args: &[String]) -> Result<String, String> {
    let options = parse_options(args, RUN_FLAGS)?;
    if let Some(extra) = options.positional.first() {
        return Err(format!("unexpected argument `{extra}`"));
    }
    let settings = load_cli_settings(&options)?;
    let query = options
        .value("--query")
        .map(str::to_string)
        .or_else(|| settings.query.clone())
        .filter(|query| !query.trim().is_empty())
        .ok_or_else(|| "no query: pass --query or set `query` in the config file".to_string())?;

    let client = OpenAiClient::from_config(&settings.llm).map_err(|err| err.to_string())?;
    let model = PacedModel::from_settings(client, &settings);
    execute_run(&settings, &query, &model)
}

/// Runs one query against the configured catalog and executor and returns the printed result.
pub fn execute_run(
    settings: &Settings,
    query: &str,
    model: &dyn LanguageModel,
) -> Result<String, String> {
    let index =
        DocumentIndex::load_dir(&settings.catalog.docs_path).map_err(|err| err.to_string())?;
    let executor = build_executor(settings)?;
    let log = RunLog::to_file(&settings.output.log_path, new_run_id());

    let orchestrator = Orchestrator::new(settings, model, &index, executor.as_ref(), &log);
    let outcome = orchestrator
        .run_and_persist(query)
        .map_err(|err| err.to_string())?;
    if let Some(reason) = outcome.abort_reason() {
        log.info(
            "cli.result",
            &[
                ("aborted", serde_json::json!(reason.code())),
                ("log", serde_json::json!(display_path(&settings.output.log_path))),
            ],
        );
    }
    outcome.render_result().map_err(|err| err.to_string())
}

pub fn build_executor(settings: &Settings) -> Result<Box<dyn CallExecutor>, String> {
    match settings.executor.kind {
        ExecutorKind::Http => Ok(Box::new(RetryingExecutor::new(
            HttpExecutor::from_config(&settings.executor),
            RetryPolicy::from_config(&settings.retry),
        ))),
        ExecutorKind::Fixture => {
            let path = settings
                .executor
                .fixtures_path
                .as_deref()
                .ok_or_else(|| "executor.fixtures_path is not set".to_string())?;
            let fixtures = FixtureExecutor::from_path(path).map_err(|err| err.to_string())?;
            Ok(Box::new(fixtures))
        }
    }
}
