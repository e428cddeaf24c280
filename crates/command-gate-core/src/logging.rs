// crates/command-gate-core/src/logging.rs
// ============================================================================
// Module: Session Logging
// Description: Component-tagged, leveled log sinks bound to a client session.
// Purpose: Deliver diagnostic messages to the calling session without globals.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! Every tool call carries a [`SessionLogger`] that forwards leveled,
//! component-tagged messages to a pluggable [`LogSink`]. A logger without a
//! sink drops messages silently, and sinks never report failures back to the
//! caller, so logging can never change the outcome of a call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity of a session log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational messages.
    Info,
    /// Recoverable anomalies.
    Warning,
    /// Failures surfaced to the client.
    Error,
}

impl LogLevel {
    /// Returns a stable label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parses a level label (case-insensitive, accepts `warn`).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A single session log message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Message severity.
    pub level: LogLevel,
    /// Component that produced the message (e.g. `cmd_runner`).
    pub component: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload appended to the rendered message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    /// Timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
}

impl LogRecord {
    /// Builds a record stamped with the current time.
    #[must_use]
    pub fn new(
        level: LogLevel,
        component: impl Into<String>,
        message: impl Into<String>,
        extra: Option<Value>,
    ) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            level,
            component: component.into(),
            message: message.into(),
            extra,
            timestamp_ms,
        }
    }

    /// Renders the client-facing form `[component] message | extra`.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut rendered = format!("[{}] {}", self.component, self.message);
        if let Some(extra) = &self.extra {
            rendered.push_str(" | ");
            rendered.push_str(&extra.to_string());
        }
        rendered
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Destination for session log records.
///
/// Implementations must not panic and must swallow their own I/O failures.
pub trait LogSink: Send + Sync {
    /// Records a log message.
    fn log(&self, record: &LogRecord);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink that discards every record.
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn log(&self, _record: &LogRecord) {}
}

/// Sink that forwards records to the `tracing` dispatcher.
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, record: &LogRecord) {
        let component = record.component.as_str();
        let extra = record.extra.as_ref().map(Value::to_string);
        match record.level {
            LogLevel::Debug => {
                tracing::debug!(component, extra = extra.as_deref(), "{}", record.message);
            }
            LogLevel::Info => {
                tracing::info!(component, extra = extra.as_deref(), "{}", record.message);
            }
            LogLevel::Warning => {
                tracing::warn!(component, extra = extra.as_deref(), "{}", record.message);
            }
            LogLevel::Error => {
                tracing::error!(component, extra = extra.as_deref(), "{}", record.message);
            }
        }
    }
}

/// Sink that writes JSON lines to stderr.
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn log(&self, record: &LogRecord) {
        if let Ok(payload) = serde_json::to_string(record) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that keeps records in memory for later relay or inspection.
#[derive(Default)]
pub struct MemoryLogSink {
    /// Collected records in arrival order.
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the collected records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Returns the rendered messages of the collected records.
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        self.records().iter().map(LogRecord::rendered).collect()
    }

    /// Removes and returns all collected records.
    #[must_use]
    pub fn drain(&self) -> Vec<LogRecord> {
        self.records.lock().map(|mut records| std::mem::take(&mut *records)).unwrap_or_default()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, record: &LogRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Sink wrapper that drops records below a minimum level.
pub struct LevelFilterSink {
    /// Lowest level forwarded to the inner sink.
    min_level: LogLevel,
    /// Wrapped sink.
    inner: Arc<dyn LogSink>,
}

impl LevelFilterSink {
    /// Wraps `inner`, forwarding only records at or above `min_level`.
    #[must_use]
    pub fn new(min_level: LogLevel, inner: Arc<dyn LogSink>) -> Self {
        Self {
            min_level,
            inner,
        }
    }
}

impl LogSink for LevelFilterSink {
    fn log(&self, record: &LogRecord) {
        if record.level >= self.min_level {
            self.inner.log(record);
        }
    }
}

// ============================================================================
// SECTION: Session Logger
// ============================================================================

/// Per-session logging handle passed explicitly through each call path.
#[derive(Clone, Default)]
pub struct SessionLogger {
    /// Bound sink; `None` drops every message.
    sink: Option<Arc<dyn LogSink>>,
}

impl SessionLogger {
    /// Creates a logger bound to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink: Some(sink),
        }
    }

    /// Creates a logger with no sink.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            sink: None,
        }
    }

    /// Returns true when a sink is bound.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Emits a record with an optional structured payload.
    pub fn log(
        &self,
        level: LogLevel,
        component: &str,
        message: impl Into<String>,
        extra: Option<Value>,
    ) {
        if let Some(sink) = &self.sink {
            sink.log(&LogRecord::new(level, component, message, extra));
        }
    }

    /// Emits a debug message.
    pub fn debug(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Debug, component, message, None);
    }

    /// Emits an info message.
    pub fn info(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, component, message, None);
    }

    /// Emits a warning message.
    pub fn warning(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Warning, component, message, None);
    }

    /// Emits an error message.
    pub fn error(&self, component: &str, message: impl Into<String>) {
        self.log(LogLevel::Error, component, message, None);
    }
}

impl fmt::Debug for SessionLogger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("SessionLogger").field("enabled", &self.is_enabled()).finish()
    }
}
