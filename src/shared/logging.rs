use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only JSON-lines log for a single run.
///
/// Every line carries `timestamp`, `level`, `event` and `runId`, plus the fields passed to
/// [`RunLog::event`]. Writes are best-effort: a log that cannot be written never fails the run.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: Option<PathBuf>,
    run_id: String,
}

impl RunLog {
    pub fn to_file(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            run_id: run_id.into(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            run_id: String::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn info(&self, event: &str, fields: &[(&str, Value)]) {
        self.event(LogLevel::Info, event, fields);
    }

    pub fn warn(&self, event: &str, fields: &[(&str, Value)]) {
        self.event(LogLevel::Warn, event, fields);
    }

    pub fn event(&self, level: LogLevel, event: &str, fields: &[(&str, Value)]) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let _ = append_log_line(path, &self.render(level, event, fields));
    }

    fn render(&self, level: LogLevel, event: &str, fields: &[(&str, Value)]) -> String {
        let mut payload = Map::new();
        payload.insert("timestamp".to_string(), Value::String(now_rfc3339()));
        payload.insert("level".to_string(), Value::String(level.to_string()));
        payload.insert("event".to_string(), Value::String(event.to_string()));
        payload.insert("runId".to_string(), Value::String(self.run_id.clone()));
        for (key, value) in fields {
            payload.insert((*key).to_string(), value.clone());
        }
        Value::Object(payload).to_string()
    }
}

pub fn new_run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}

fn append_log_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn events_append_one_json_object_per_line() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("logs/run.log");
        let log = RunLog::to_file(&path, "run-1");

        log.info("run.started", &[("query", Value::from("list issues"))]);
        log.warn("arguments.malformed", &[]);

        let raw = fs::read_to_string(&path).expect("read log");
        let lines = raw.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(first["event"], "run.started");
        assert_eq!(first["level"], "info");
        assert_eq!(first["runId"], "run-1");
        assert_eq!(first["query"], "list issues");

        let second: Value = serde_json::from_str(lines[1]).expect("json line");
        assert_eq!(second["level"], "warn");
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = RunLog::disabled();
        log.info("run.started", &[]);
        assert!(log.path().is_none());
    }
}
