//! Session log sink
//!
//! Sessions and the pool report their outcomes through an explicit
//! [`SessionLog`] handle instead of reaching for a global logger. The default
//! sink forwards to `tracing`; [`MemoryLog`] keeps records for inspection.

use std::sync::Mutex;
use tracing::Level;

/// Append-only sink for session events, shared by every session
pub trait SessionLog: Send + Sync + 'static {
    /// Record one event for the session labelled `label`
    fn record(&self, label: &str, level: Level, message: &str, error: Option<&anyhow::Error>);
}

/// Forwards session events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl SessionLog for TracingLog {
    fn record(&self, label: &str, level: Level, message: &str, error: Option<&anyhow::Error>) {
        match (level, error) {
            (Level::ERROR, Some(e)) => tracing::error!(session = label, "{}: {:#}", message, e),
            (Level::ERROR, None) => tracing::error!(session = label, "{}", message),
            (Level::WARN, Some(e)) => tracing::warn!(session = label, "{}: {:#}", message, e),
            (Level::WARN, None) => tracing::warn!(session = label, "{}", message),
            (Level::INFO, Some(e)) => tracing::info!(session = label, "{}: {:#}", message, e),
            (Level::INFO, None) => tracing::info!(session = label, "{}", message),
            (Level::DEBUG, Some(e)) => tracing::debug!(session = label, "{}: {:#}", message, e),
            (Level::DEBUG, None) => tracing::debug!(session = label, "{}", message),
            (_, Some(e)) => tracing::trace!(session = label, "{}: {:#}", message, e),
            (_, None) => tracing::trace!(session = label, "{}", message),
        }
    }
}

/// One captured session event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Session label
    pub label: String,
    /// Severity
    pub level: Level,
    /// Event message
    pub message: String,
    /// Rendered error chain, if any
    pub error: Option<String>,
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records so far
    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Records whose label starts with `label`
    pub fn records_for(&self, label: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.label.starts_with(label))
            .collect()
    }
}

impl SessionLog for MemoryLog {
    fn record(&self, label: &str, level: Level, message: &str, error: Option<&anyhow::Error>) {
        let record = LogRecord {
            label: label.to_string(),
            level,
            message: message.to_string(),
            error: error.map(|e| format!("{:#}", e)),
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
