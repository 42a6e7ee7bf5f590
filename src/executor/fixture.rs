use super::{ApiCall, CallExecutor, CallOutcome, ExecutorError};
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FixtureEntry {
    Sequence(Vec<Value>),
    Single(Value),
}

/// Replays canned responses by API name.
///
/// A fixture maps an API name to one response object, or to a list consumed in order where
/// the last response repeats once the list is exhausted. Calls to unknown APIs yield a 404
/// outcome. Every call is recorded and available through [`FixtureExecutor::calls`].
#[derive(Debug, Default)]
pub struct FixtureExecutor {
    responses: BTreeMap<String, Vec<Value>>,
    cursors: RefCell<BTreeMap<String, usize>>,
    calls: RefCell<Vec<ApiCall>>,
}

impl FixtureExecutor {
    pub fn from_path(path: &Path) -> Result<Self, ExecutorError> {
        let raw = fs::read_to_string(path).map_err(|source| ExecutorError::FixtureRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ExecutorError::FixtureParse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        let entries: BTreeMap<String, FixtureEntry> = serde_yaml::from_str(raw)?;
        Ok(Self::from_responses(entries.into_iter().map(
            |(api_name, entry)| match entry {
                FixtureEntry::Sequence(items) => (api_name, items),
                FixtureEntry::Single(item) => (api_name, vec![item]),
            },
        )))
    }

    pub fn from_responses(responses: impl IntoIterator<Item = (String, Vec<Value>)>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            cursors: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.borrow().clone()
    }

    fn next_response(&self, api_name: &str) -> Option<Value> {
        let responses = self.responses.get(api_name)?;
        let mut cursors = self.cursors.borrow_mut();
        let cursor = cursors.entry(api_name.to_string()).or_insert(0);
        let index = (*cursor).min(responses.len().checked_sub(1)?);
        *cursor += 1;
        responses.get(index).cloned()
    }
}

impl CallExecutor for FixtureExecutor {
    fn run(&self, call: &ApiCall) -> Result<CallOutcome, ExecutorError> {
        self.calls.borrow_mut().push(call.clone());
        match self.next_response(&call.api_name) {
            Some(response) => CallOutcome::from_response(&call.api_name, response),
            None => Ok(CallOutcome::failure(
                404,
                format!("unknown api `{}`", call.api_name),
            )),
        }
    }
}
