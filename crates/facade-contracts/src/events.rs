use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything a session reports to its event log. Serialized with the
/// variant name as `type`, fields alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        provider: String,
        retry_attempts: u32,
    },
    ViewChanged {
        view: String,
    },
    HistoryChanged {
        cause: String,
        count: usize,
    },
    /// Manifest of the request a provider sent; image bytes are elided.
    RequestBuilt {
        request: Map<String, Value>,
    },
    RetryScheduled {
        attempt: u32,
        attempts: u32,
        delay_ms: u64,
        error: String,
    },
    ResultReady {
        result: Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    SuggestionsReady {
        count: usize,
        request: Map<String, Value>,
    },
    OperationFailed {
        operation: String,
        error_kind: String,
        message: String,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::ViewChanged { .. } => "view_changed",
            Self::HistoryChanged { .. } => "history_changed",
            Self::RequestBuilt { .. } => "request_built",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::ResultReady { .. } => "result_ready",
            Self::SuggestionsReady { .. } => "suggestions_ready",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

/// One line of the log: the event plus the session it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Append-only JSONL log for one session. Clones share the file lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Writer with a fresh random session id.
    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        let session_id = format!("session-{}", uuid::Uuid::new_v4().simple());
        Self::new(path, session_id)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event: SessionEvent) -> io::Result<EventRecord> {
        let record = EventRecord {
            session_id: self.inner.session_id.clone(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            event,
        };
        let line = serde_json::to_string(&record)?;

        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| io::Error::other("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        writeln!(file, "{line}")?;
        Ok(record)
    }
}

/// Reads a session log back. Blank lines are skipped.
pub fn read_events(path: &Path) -> io::Result<Vec<EventRecord>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(io::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{read_events, EventWriter, SessionEvent};

    #[test]
    fn emit_writes_tagged_session_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit(SessionEvent::OperationFailed {
            operation: "process".to_string(),
            error_kind: "access_denied".to_string(),
            message: "access denied: pending approval".to_string(),
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.trim_end())?;
        assert_eq!(parsed["type"], json!("operation_failed"));
        assert_eq!(parsed["session_id"], json!("session-123"));
        assert_eq!(parsed["operation"], json!("process"));
        assert_eq!(parsed["error_kind"], json!("access_denied"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn kind_matches_serialized_type() -> anyhow::Result<()> {
        let events = [
            SessionEvent::SessionStarted {
                provider: "dryrun".to_string(),
                retry_attempts: 3,
            },
            SessionEvent::ViewChanged {
                view: "enhance".to_string(),
            },
            SessionEvent::HistoryChanged {
                cause: "upload".to_string(),
                count: 1,
            },
            SessionEvent::RetryScheduled {
                attempt: 1,
                attempts: 3,
                delay_ms: 1000,
                error: "gemini transport error: reset".to_string(),
            },
            SessionEvent::ResultReady {
                result: json!({ "kind": "create" }),
                warnings: Vec::new(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event)?;
            assert_eq!(value["type"], json!(event.kind()));
        }
        Ok(())
    }

    #[test]
    fn log_round_trips_through_read_events() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::for_new_session(&path);
        assert!(writer.session_id().starts_with("session-"));

        writer.emit(SessionEvent::ViewChanged {
            view: "enhance".to_string(),
        })?;
        writer.emit(SessionEvent::HistoryChanged {
            cause: "continue_editing".to_string(),
            count: 2,
        })?;

        let records = read_events(&path)?;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.session_id == writer.session_id()));
        assert_eq!(
            records[1].event,
            SessionEvent::HistoryChanged {
                cause: "continue_editing".to_string(),
                count: 2,
            }
        );
        Ok(())
    }
}
