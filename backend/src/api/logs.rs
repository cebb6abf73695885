//! Real-time log streaming via Server-Sent Events (SSE).
//!
//! The server keeps one [`LogBroadcaster`] in its state; load summaries are
//! pushed to it and streamed to every connected client. Each entry is also
//! emitted as a `tracing` event.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::transform::pipeline::LoadResult;

/// Log level for client display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting level for grouped messages
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Info | LogLevel::Success => tracing::info!(indent = entry.indent, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(indent = entry.indent, "{}", entry.message),
            LogLevel::Error => tracing::error!(indent = entry.indent, "{}", entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.log(LogEntry::info(msg));
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.log(LogEntry::success(msg));
    }

    pub fn warning(&self, msg: impl Into<String>) {
        self.log(LogEntry::warning(msg));
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.log(LogEntry::error(msg));
    }

    /// Publish the summary of a completed load.
    pub fn load_summary(&self, result: &LoadResult) {
        for entry in load_summary_entries(result) {
            self.log(entry);
        }
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Log entries describing a completed load, in display order.
pub fn load_summary_entries(result: &LoadResult) -> Vec<LogEntry> {
    let info = &result.csv_info;
    let mut entries = vec![
        LogEntry::success(format!("Detected encoding: {}", info.encoding)),
        LogEntry::success(format!("Detected separator: '{}'", info.delimiter.escape_default())),
        LogEntry::success(format!("Read {} records ({} columns)", info.row_count, info.headers.len())),
        LogEntry::success(format!("Grouped {} rows into {} formulas", result.row_count, result.formulas.len())),
    ];

    if !result.skipped.is_empty() {
        entries.push(LogEntry::warning(format!(
            "{} records skipped (missing required fields)",
            result.skipped.len()
        )));
        for skip in result.skipped.iter().take(5) {
            entries.push(
                LogEntry::warning(format!("line {}: missing {}", skip.line, skip.missing.join(", "))).with_indent(1),
            );
        }
    }

    if !result.coercions.is_empty() {
        entries.push(LogEntry::warning(format!(
            "{} numeric values could not be read",
            result.coercions.len()
        )));
    }

    for (formula_id, errors) in result.schema_errors.iter().take(3) {
        entries.push(LogEntry::error(format!("Formula {}: {}", formula_id, errors.join(", "))));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::pipeline::{load_formulas_from_bytes, LoadOptions};

    #[test]
    fn test_log_entry_json() {
        let json = serde_json::to_value(LogEntry::warning("careful").with_indent(2)).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "careful");
        assert_eq!(json["indent"], 2);
    }

    #[test]
    fn test_subscribers_receive_entries() {
        let logs = LogBroadcaster::new();
        let mut rx = logs.subscribe();

        logs.info("hello");
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "hello");
    }

    #[test]
    fn test_load_summary_mentions_skips() {
        let csv = "formula_id,formula_name,material_id,material_name,qty\nF001,A,M001,Water,1\n,B,M002,Salt,x";
        let result = load_formulas_from_bytes(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let entries = load_summary_entries(&result);

        assert!(entries.iter().any(|e| e.message.contains("1 rows into 1 formulas")));
        assert!(entries
            .iter()
            .any(|e| e.level == LogLevel::Warning && e.message.contains("line 3: missing formula_id")));
    }
}
