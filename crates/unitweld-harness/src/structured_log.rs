//! Structured JSONL build event log.
//!
//! One JSON object per line, with required `timestamp`, `trace_id`, `level`,
//! and `event` fields plus optional build context. The trace id is derived
//! from the build inputs, so two logs of the same build correlate without
//! any shared state.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Canonical structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix-epoch seconds at emission.
    pub timestamp: String,
    /// Correlates all entries of one build.
    pub trace_id: String,
    pub level: LogLevel,
    /// Event name, dot-separated (`build.compile`, `run.exit`, ...).
    pub event: String,
    /// Pipeline stage (`plan`, `compile`, `link`, `run`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Symbol the event is about, when symbol-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Terminal outcome (`pass`, `fail`, `error`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Free-form detail (rendered command line, diagnostic text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LogEntry {
    /// New entry with the current timestamp.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_timestamp(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            stage: None,
            symbol: None,
            outcome: None,
            detail: None,
        }
    }

    #[must_use]
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    #[must_use]
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Unix-epoch seconds as a string.
#[must_use]
pub fn now_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| String::from("0"))
}

enum Sink {
    Stderr,
    File(BufWriter<File>),
}

/// Writes JSONL entries to stderr or a file.
pub struct LogEmitter {
    sink: Sink,
}

impl LogEmitter {
    /// Emit to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self { sink: Sink::Stderr }
    }

    /// Emit to a file, creating parent directories as needed.
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            sink: Sink::File(BufWriter::new(file)),
        })
    }

    /// Write one entry as a JSON line. Serialization of [`LogEntry`] cannot
    /// fail; I/O errors are reported.
    pub fn emit(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry).unwrap_or_else(|_| String::from("{}"));
        match &mut self.sink {
            Sink::Stderr => {
                eprintln!("{line}");
                Ok(())
            }
            Sink::File(writer) => {
                writeln!(writer, "{line}")?;
                writer.flush()
            }
        }
    }
}
