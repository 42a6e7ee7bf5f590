use revchain::executor::{
    ApiCall, CallExecutor, CallOutcome, ExecutorError, FixtureExecutor, RetryingExecutor,
};
use revchain::shared::RetryPolicy;
use serde_json::{json, Map};
use std::cell::Cell;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

fn call(api_name: &str) -> ApiCall {
    ApiCall {
        api_name: api_name.to_string(),
        arguments: Map::new(),
    }
}

#[test]
fn fixture_file_replays_responses_by_api_name() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("fixtures.yaml");
    fs::write(
        &path,
        r#"
who_am_i:
  status: 200
  message: Identified the user.
  id: DEVU-1
works_list:
  - status: 500
    error: timeout
  - status: 200
    works: [ISS-1]
"#,
    )
    .expect("write");

    let executor = FixtureExecutor::from_path(&path).expect("fixtures");
    let who = executor.run(&call("who_am_i")).expect("run");
    assert!(who.is_success());
    assert_eq!(who.outputs.get("id"), Some(&json!("DEVU-1")));
    assert_eq!(who.observation("who_am_i"), "Identified the user.");

    let first = executor.run(&call("works_list")).expect("run");
    assert_eq!(first.observation("works_list"), "Unsuccessful attempt, cause: timeout!");
    let second = executor.run(&call("works_list")).expect("run");
    assert_eq!(second.outputs.get("works"), Some(&json!(["ISS-1"])));

    let recorded = executor
        .calls()
        .into_iter()
        .map(|call| call.api_name)
        .collect::<Vec<_>>();
    assert_eq!(recorded, vec!["who_am_i", "works_list", "works_list"]);
}

#[test]
fn invalid_fixture_yaml_names_the_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "who_am_i: [unclosed").expect("write");
    let err = FixtureExecutor::from_path(&path).expect_err("broken");
    assert!(matches!(err, ExecutorError::FixtureParse { .. }));
    assert!(err.to_string().contains("broken.yaml"));
}

struct FlakyExecutor {
    failures_left: Cell<u32>,
}

impl CallExecutor for FlakyExecutor {
    fn run(&self, call: &ApiCall) -> Result<CallOutcome, ExecutorError> {
        if self.failures_left.get() > 0 {
            self.failures_left.set(self.failures_left.get() - 1);
            return Err(ExecutorError::Transport {
                api_name: call.api_name.clone(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(CallOutcome::success("ok", Map::new()))
    }
}

#[test]
fn retrying_executor_recovers_from_transport_faults() {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    };
    let executor = RetryingExecutor::new(
        FlakyExecutor {
            failures_left: Cell::new(2),
        },
        policy,
    );
    let outcome = executor.run(&call("who_am_i")).expect("recovered");
    assert!(outcome.is_success());
}
