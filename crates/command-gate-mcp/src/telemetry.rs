// crates/command-gate-mcp/src/telemetry.rs
// ============================================================================
// Module: Call Telemetry
// Description: Span records, exporters, and the tool call interceptor.
// Purpose: Observe every tool and resource call without altering its outcome.
// Dependencies: regex, serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`ToolTracer`] wraps a call (async via [`ToolTracer::instrument`], sync via
//! [`ToolTracer::instrument_sync`]) and produces exactly one [`SpanRecord`]
//! per call, handed to a pluggable [`SpanExporter`]. Arguments are filtered
//! and redacted before they are recorded, and the wrapped result is always
//! returned unchanged.
//! Invariants:
//! - Secret-looking arguments are recorded only as [`REDACTION_MARKER`].
//! - The interceptor never swallows or rewrites an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use regex::Regex;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::config::TelemetryConfig;
use crate::session::RequestContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Value recorded in place of a secret.
pub const REDACTION_MARKER: &str = "***";
/// Marker appended to truncated values.
pub const TRUNCATION_MARKER: char = '…';
/// Maximum characters kept in an error status message.
pub const STATUS_MESSAGE_LIMIT: usize = 200;
/// Key fragments that mark an argument name as secret.
const SECRET_KEY_FRAGMENTS: [&str; 7] =
    ["token", "secret", "password", "passwd", "apikey", "api_key", "bearer"];
/// Pattern matching secret-looking values.
const SECRET_VALUE_PATTERN: &str =
    r"(?i)(?:^|[^a-z])(?:token|secret|password|apikey|api_key|bearer)(?:[^a-z]|$)";

/// Compiled secret value pattern; `None` only if the pattern fails to compile.
static SECRET_VALUE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(SECRET_VALUE_PATTERN)
        .map_err(|err| {
            tracing::error!(error = %err, "secret value pattern rejected; redacting all values");
        })
        .ok()
});

// ============================================================================
// SECTION: Span Model
// ============================================================================

/// Span kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// In-process operation.
    #[default]
    Internal,
    /// Inbound request handling.
    Server,
    /// Outbound request.
    Client,
}

/// Terminal span status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SpanStatus {
    /// The call has not finished.
    #[default]
    Unset,
    /// The call succeeded.
    Ok,
    /// The call failed.
    Error {
        /// Redacted, truncated failure message.
        message: String,
    },
}

/// A timestamped span event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanEvent {
    /// Event name (`start`, `finish`, `exception`).
    pub name: String,
    /// Event attributes.
    pub attributes: BTreeMap<String, String>,
    /// Timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
}

/// A sealed record of one intercepted call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanRecord {
    /// Span name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Service that produced the span.
    pub service_name: String,
    /// Recorded attributes.
    pub attributes: BTreeMap<String, Value>,
    /// Events in emission order.
    pub events: Vec<SpanEvent>,
    /// Terminal status.
    pub status: SpanStatus,
    /// Start timestamp (milliseconds since epoch).
    pub start_ms: u128,
    /// End timestamp (milliseconds since epoch).
    pub end_ms: u128,
}

impl SpanRecord {
    /// Returns the attribute stored under `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the string attribute stored under `key`.
    #[must_use]
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        self.attribute(key).and_then(Value::as_str)
    }

    /// Returns the event names in order.
    #[must_use]
    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.name.as_str()).collect()
    }

    /// Returns the first event named `name`.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&SpanEvent> {
        self.events.iter().find(|event| event.name == name)
    }
}

// ============================================================================
// SECTION: Exporters
// ============================================================================

/// Destination for sealed spans. Must never fail the traced call.
pub trait SpanExporter: Send + Sync {
    /// Receives a sealed span.
    fn export(&self, span: SpanRecord);
}

/// Exporter that discards spans.
pub struct NoopSpanExporter;

impl SpanExporter for NoopSpanExporter {
    fn export(&self, _span: SpanRecord) {}
}

/// Exporter that emits one `tracing` event per span.
pub struct LogSpanExporter;

impl SpanExporter for LogSpanExporter {
    fn export(&self, span: SpanRecord) {
        let status = match &span.status {
            SpanStatus::Unset => "unset",
            SpanStatus::Ok => "ok",
            SpanStatus::Error {
                ..
            } => "error",
        };
        let attributes = serde_json::to_string(&span.attributes).unwrap_or_default();
        let duration_ms = span.end_ms.saturating_sub(span.start_ms);
        tracing::info!(
            target: "command_gate::spans",
            span = %span.name,
            service = %span.service_name,
            status,
            duration_ms = u64::try_from(duration_ms).unwrap_or(u64::MAX),
            attributes = %attributes,
            "span finished"
        );
    }
}

/// Exporter that keeps spans in memory.
#[derive(Default)]
pub struct InMemorySpanExporter {
    /// Exported spans in arrival order.
    spans: Mutex<Vec<SpanRecord>>,
}

impl InMemorySpanExporter {
    /// Creates an empty exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of exported spans.
    #[must_use]
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().map(|spans| spans.clone()).unwrap_or_default()
    }

    /// Returns the most recent span named `name`.
    #[must_use]
    pub fn last_named(&self, name: &str) -> Option<SpanRecord> {
        self.spans().into_iter().rev().find(|span| span.name == name)
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&self, span: SpanRecord) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(span);
        }
    }
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Returns true when `value` contains a secret-looking word.
///
/// Every value counts as secret when the pattern is unavailable.
#[must_use]
pub fn looks_secret(value: &str) -> bool {
    SECRET_VALUE_RE.as_ref().is_none_or(|pattern| pattern.is_match(value))
}

/// Returns true when an argument name marks its value as secret.
#[must_use]
pub fn is_secret_key(key: &str, redact_keys: &BTreeSet<String>) -> bool {
    let key = key.to_ascii_lowercase();
    redact_keys.contains(&key) || SECRET_KEY_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Truncates `value` to at most `max_len` characters, marking the cut.
#[must_use]
pub fn truncate_value(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_len.saturating_sub(1)).collect();
    truncated.push(TRUNCATION_MARKER);
    truncated
}

/// Masks secret-looking entries of an argument vector.
///
/// An entry is masked when it looks secret itself or follows a bare flag
/// whose name looks secret (e.g. `--token abc`).
#[must_use]
pub fn redact_argv(argv: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(argv.len());
    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            redacted.push(REDACTION_MARKER.to_string());
            mask_next = false;
            continue;
        }
        if looks_secret(arg) {
            mask_next = arg.starts_with('-') && !arg.contains('=');
            redacted.push(REDACTION_MARKER.to_string());
        } else {
            redacted.push(arg.clone());
        }
    }
    redacted
}

/// Masks secret-looking words of free text, preserving spacing.
#[must_use]
pub fn redact_text(text: &str) -> String {
    if !looks_secret(text) {
        return text.to_string();
    }
    let words: Vec<String> = text.split(' ').map(str::to_string).collect();
    redact_argv(&words).join(" ")
}

/// Renders an argument value as recorded text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Stringified length of a call result.
pub trait ReturnLength {
    /// Returns the character count of the stringified result.
    fn return_length(&self) -> usize;
}

impl ReturnLength for String {
    fn return_length(&self) -> usize {
        self.chars().count()
    }
}

impl ReturnLength for Value {
    fn return_length(&self) -> usize {
        stringify(self).chars().count()
    }
}

impl<T: ReturnLength> ReturnLength for Option<T> {
    fn return_length(&self) -> usize {
        self.as_ref().map_or(0, ReturnLength::return_length)
    }
}

// ============================================================================
// SECTION: Tracer Options
// ============================================================================

/// Per-call-site recording options.
#[derive(Debug, Clone)]
pub struct TracerOptions {
    /// Prefix for every recorded attribute.
    pub attribute_prefix: String,
    /// When set, only these (lowercase) argument names are recorded.
    pub allow: Option<BTreeSet<String>>,
    /// Lowercase argument names never recorded.
    pub deny: BTreeSet<String>,
    /// Lowercase argument names always redacted.
    pub redact_keys: BTreeSet<String>,
    /// Maximum recorded value length.
    pub max_value_len: usize,
    /// Record the stringified result length.
    pub capture_return_len: bool,
    /// Span kind.
    pub kind: SpanKind,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

impl TracerOptions {
    /// Builds options from telemetry settings.
    #[must_use]
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let lower = |names: &BTreeSet<String>| -> BTreeSet<String> {
            names.iter().map(|name| name.to_ascii_lowercase()).collect()
        };
        Self {
            attribute_prefix: config.attribute_prefix.clone(),
            allow: config.arg_allowlist.as_ref().map(lower),
            deny: lower(&config.arg_denylist),
            redact_keys: lower(&config.redact_keys),
            max_value_len: config.max_value_len,
            capture_return_len: config.capture_return_len,
            kind: SpanKind::Internal,
        }
    }

    /// Returns a copy using `prefix` for attribute names.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attribute_prefix = prefix.into();
        self
    }

    /// Builds the argument attributes recorded for `args`.
    #[must_use]
    pub fn argument_attributes(&self, args: &Map<String, Value>) -> BTreeMap<String, Value> {
        let mut attributes = BTreeMap::new();
        for (name, value) in args {
            if name.starts_with('_') {
                continue;
            }
            let lower = name.to_ascii_lowercase();
            if self.allow.as_ref().is_some_and(|allow| !allow.contains(&lower)) {
                continue;
            }
            if self.deny.contains(&lower) {
                continue;
            }
            let text = stringify(value);
            let recorded = if is_secret_key(&lower, &self.redact_keys) || looks_secret(&text) {
                REDACTION_MARKER.to_string()
            } else {
                truncate_value(&text, self.max_value_len)
            };
            attributes.insert(format!("{}.arg.{name}", self.attribute_prefix), Value::String(recorded));
        }
        attributes
    }
}

// ============================================================================
// SECTION: Tracer
// ============================================================================

/// Description of one intercepted call.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    /// Span name (e.g. `tool.kubectl`).
    pub span_name: &'a str,
    /// Function name recorded as `<prefix>.name`.
    pub function_name: &'a str,
    /// Recording options.
    pub options: &'a TracerOptions,
    /// Bound arguments, defaults applied.
    pub args: &'a Map<String, Value>,
    /// Calling request metadata.
    pub context: Option<&'a RequestContext>,
}

/// Interceptor producing one span per call.
#[derive(Clone)]
pub struct ToolTracer {
    /// Span destination.
    exporter: Arc<dyn SpanExporter>,
    /// Service name stamped on spans.
    service_name: String,
}

impl ToolTracer {
    /// Creates a tracer exporting to `exporter`.
    #[must_use]
    pub fn new(exporter: Arc<dyn SpanExporter>, service_name: impl Into<String>) -> Self {
        Self {
            exporter,
            service_name: service_name.into(),
        }
    }

    /// Creates a tracer that discards spans.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSpanExporter), crate::config::DEFAULT_SERVER_NAME)
    }

    /// Opens a span for `call` and emits its `start` event.
    #[must_use]
    pub fn start(&self, call: CallSite<'_>) -> ActiveSpan {
        let prefix = call.options.attribute_prefix.clone();
        let mut attributes = call.options.argument_attributes(call.args);
        attributes.insert(format!("{prefix}.name"), Value::String(call.function_name.to_string()));
        if let Some(context) = call.context {
            for (field, value) in context.fields() {
                attributes.insert(
                    format!("{prefix}.ctx.{field}"),
                    Value::String(truncate_value(value, call.options.max_value_len)),
                );
            }
        }
        let mut span = ActiveSpan {
            record: SpanRecord {
                name: call.span_name.to_string(),
                kind: call.options.kind,
                service_name: self.service_name.clone(),
                attributes,
                events: Vec::new(),
                status: SpanStatus::Unset,
                start_ms: now_ms(),
                end_ms: 0,
            },
            prefix,
            capture_return_len: call.options.capture_return_len,
            max_value_len: call.options.max_value_len,
            exporter: Arc::clone(&self.exporter),
        };
        span.add_event("start", BTreeMap::new());
        span
    }

    /// Runs an async call inside a span.
    ///
    /// # Errors
    ///
    /// Returns the wrapped call's error unchanged.
    pub async fn instrument<T, E, F>(&self, call: CallSite<'_>, work: F) -> Result<T, E>
    where
        T: ReturnLength,
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let span = self.start(call);
        let scope = tracing::info_span!("gateway_call", name = call.span_name);
        let result = tracing::Instrument::instrument(work, scope).await;
        span.seal(&result);
        result
    }

    /// Runs a sync call inside a span with the same recording as
    /// [`Self::instrument`].
    ///
    /// # Errors
    ///
    /// Returns the wrapped call's error unchanged.
    pub fn instrument_sync<T, E, F>(&self, call: CallSite<'_>, work: F) -> Result<T, E>
    where
        T: ReturnLength,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let span = self.start(call);
        let scope = tracing::info_span!("gateway_call", name = call.span_name);
        let result = scope.in_scope(work);
        span.seal(&result);
        result
    }
}

/// A span that has started but not yet been sealed.
pub struct ActiveSpan {
    /// Record under construction.
    record: SpanRecord,
    /// Attribute prefix.
    prefix: String,
    /// Record the result length on success.
    capture_return_len: bool,
    /// Maximum recorded value length.
    max_value_len: usize,
    /// Destination for the sealed record.
    exporter: Arc<dyn SpanExporter>,
}

impl ActiveSpan {
    /// Appends an event.
    fn add_event(&mut self, name: &str, attributes: BTreeMap<String, String>) {
        self.record.events.push(SpanEvent {
            name: name.to_string(),
            attributes,
            timestamp_ms: now_ms(),
        });
    }

    /// Seals the span from a call result.
    pub fn seal<T: ReturnLength, E: fmt::Display>(self, result: &Result<T, E>) {
        match result {
            Ok(value) => self.finish_ok(value.return_length()),
            Err(err) => self.finish_err(&err.to_string()),
        }
    }

    /// Seals the span as successful.
    pub fn finish_ok(mut self, return_length: usize) {
        if self.capture_return_len {
            self.record
                .attributes
                .insert(format!("{}.return_length", self.prefix), Value::from(return_length));
        }
        self.add_event("finish", status_attribute("ok"));
        self.record.status = SpanStatus::Ok;
        self.export();
    }

    /// Seals the span as failed.
    pub fn finish_err(mut self, message: &str) {
        let redacted = redact_text(message);
        let mut exception = BTreeMap::new();
        exception.insert(
            "exception.message".to_string(),
            truncate_value(&redacted, self.max_value_len),
        );
        self.add_event("exception", exception);
        self.record.status = SpanStatus::Error {
            message: redacted.chars().take(STATUS_MESSAGE_LIMIT).collect(),
        };
        self.add_event("finish", status_attribute("error"));
        self.export();
    }

    /// Stamps the end time and hands the record to the exporter.
    fn export(mut self) {
        self.record.end_ms = now_ms();
        self.exporter.export(self.record);
    }
}

/// Builds a `{status: <value>}` attribute map.
fn status_attribute(value: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    attributes.insert("status".to_string(), value.to_string());
    attributes
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
