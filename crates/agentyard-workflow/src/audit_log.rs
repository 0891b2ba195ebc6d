//! Structured newline-delimited-JSON event log. Kept as a secondary,
//! optional sink alongside `tracing` for operational tooling that tails a
//! file rather than subscribing to a tracing layer; events append to a
//! configured file so a restart can replay them.

use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub ts: String,
    pub level: &'static str,
    pub event: &'static str,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

pub struct AuditLog {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: Mutex::new(None) }
    }

    fn emit(&self, level: &'static str, event: &'static str, data: serde_json::Value) {
        let entry = LogEvent { ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(), level, event, data };
        let Ok(json) = serde_json::to_string(&entry) else { return };

        let mut guard = self.file.lock().unwrap();
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            *guard = std::fs::OpenOptions::new().create(true).append(true).open(&self.path).ok();
        }
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{json}");
        }
    }

    pub fn info(&self, event: &'static str, data: serde_json::Value) {
        self.emit("info", event, data);
    }

    pub fn warn(&self, event: &'static str, data: serde_json::Value) {
        self.emit("warn", event, data);
    }

    pub fn error(&self, event: &'static str, data: serde_json::Value) {
        self.emit("error", event, data);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_append_as_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.ndjson"));
        log.info("worker_spawned", serde_json::json!({ "worker_id": "w1" }));
        log.warn("escalation_created", serde_json::json!({ "ticket_id": "proj-0001-01-001" }));

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "worker_spawned");
        assert_eq!(first["level"], "info");
        assert_eq!(first["worker_id"], "w1");
    }
}
