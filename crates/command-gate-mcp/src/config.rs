// crates/command-gate-mcp/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Typed gateway settings with defaults and environment overrides.
// Purpose: Thread approval, kubectl, telemetry, and logging settings explicitly.
// Dependencies: command-gate-core, serde, thiserror
// ============================================================================

//! ## Overview
//! [`GatewayConfig`] groups every process-wide setting the gateway reads. It
//! deserializes with per-section defaults, accepts environment overrides via
//! [`GatewayConfig::from_env`], and must pass [`GatewayConfig::validate`]
//! before the gateway is built. There is no config file; settings come from
//! defaults, the environment, and the embedding program.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use command_gate_core::LogLevel;
use command_gate_core::kubectl::KUBECTL_PROGRAM;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable toggling the approval gate.
pub const REQUIRE_APPROVAL_ENV: &str = "COMMAND_GATE_REQUIRE_APPROVAL";
/// Environment variable overriding the kubectl program.
pub const KUBECTL_PROGRAM_ENV: &str = "COMMAND_GATE_KUBECTL";
/// Environment variable selecting the session log sink.
pub const LOG_SINK_ENV: &str = "COMMAND_GATE_LOG_SINK";
/// Environment variable naming the traced service.
pub const SERVICE_NAME_ENV: &str = "OTEL_SERVICE_NAME";
/// Environment variable selecting the span exporter.
pub const TRACES_EXPORTER_ENV: &str = "OTEL_TRACES_EXPORTER";

/// Default server and service name.
pub const DEFAULT_SERVER_NAME: &str = "mcp-server";
/// Instructions handed to clients on connect.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a Kubernetes operations assistant. Use kubectl \
     tool to inspect pods, deployments, services, and logs. Use base64 tool to decode secrets or \
     encode config data. Always check current cluster context first, request user confirmation \
     for any destructive operations, and provide actionable troubleshooting steps.";
/// Default attribute prefix for tool spans.
pub const DEFAULT_ATTRIBUTE_PREFIX: &str = "mcp.tool";
/// Default kubectl timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
/// Default maximum span attribute length.
pub const DEFAULT_MAX_VALUE_LEN: usize = 256;
/// Smallest accepted span attribute length.
const MIN_MAX_VALUE_LEN: usize = 8;
/// Largest accepted span attribute length.
const MAX_MAX_VALUE_LEN: usize = 65_536;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Gateway configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Server identity.
    #[serde(default)]
    pub server: ServerConfig,
    /// Approval gate settings.
    #[serde(default)]
    pub approval: ApprovalConfig,
    /// Kubectl invocation settings.
    #[serde(default)]
    pub kubectl: KubectlConfig,
    /// Span export and attribute settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Session log sink settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Builds a configuration from defaults plus process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is malformed or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from defaults plus overrides read via `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is malformed or the result
    /// fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment-style overrides in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an override value is malformed.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(REQUIRE_APPROVAL_ENV) {
            self.approval.required = parse_bool(REQUIRE_APPROVAL_ENV, &value)?;
        }
        if let Some(value) = lookup(KUBECTL_PROGRAM_ENV) {
            self.kubectl.program = value.trim().to_string();
        }
        if let Some(value) = lookup(LOG_SINK_ENV) {
            self.logging.sink = LogSinkKind::parse(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("{LOG_SINK_ENV} must be none, stderr, or tracing"))
            })?;
        }
        if let Some(value) = lookup(SERVICE_NAME_ENV) {
            self.telemetry.service_name = value.trim().to_string();
        }
        if let Some(value) = lookup(TRACES_EXPORTER_ENV) {
            self.telemetry.exporter = SpanExporterKind::parse(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("{TRACES_EXPORTER_ENV} must be none, log, or memory"))
            })?;
        }
        Ok(())
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.kubectl.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Server identity presented to clients.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Usage instructions for clients.
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            instructions: default_instructions(),
        }
    }
}

impl ServerConfig {
    /// Validates server identity.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("server.name must be set".to_string()));
        }
        Ok(())
    }
}

/// Approval gate settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApprovalConfig {
    /// Require confirmation before mutating kubectl verbs.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Mask secret-looking arguments in approval audit lines.
    #[serde(default = "default_true")]
    pub redact_audit_args: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            required: true,
            redact_audit_args: true,
        }
    }
}

/// Kubectl invocation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct KubectlConfig {
    /// Executable invoked for kubectl calls.
    #[serde(default = "default_program")]
    pub program: String,
    /// Timeout applied when a call does not supply one.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl KubectlConfig {
    /// Validates kubectl settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::Invalid("kubectl.program must be set".to_string()));
        }
        if !self.default_timeout_secs.is_finite() || self.default_timeout_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "kubectl.default_timeout_secs must be a finite, non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default timeout; zero means no limit.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_timeout_secs).unwrap_or_default()
    }
}

/// Span exporter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanExporterKind {
    /// Spans are discarded.
    #[default]
    None,
    /// Spans are emitted as `tracing` events.
    Log,
    /// Spans are kept in memory.
    Memory,
}

impl SpanExporterKind {
    /// Parses an exporter label; `otlp` maps to `log`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "log" | "otlp" => Some(Self::Log),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Span export and attribute settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Exporter receiving sealed spans.
    #[serde(default)]
    pub exporter: SpanExporterKind,
    /// Service name stamped on every span.
    #[serde(default = "default_server_name")]
    pub service_name: String,
    /// Attribute prefix for tool spans.
    #[serde(default = "default_attribute_prefix")]
    pub attribute_prefix: String,
    /// Maximum recorded attribute length.
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,
    /// Argument names always redacted.
    #[serde(default)]
    pub redact_keys: BTreeSet<String>,
    /// When set, only these argument names are recorded.
    #[serde(default)]
    pub arg_allowlist: Option<BTreeSet<String>>,
    /// Argument names never recorded.
    #[serde(default)]
    pub arg_denylist: BTreeSet<String>,
    /// Record the stringified result length.
    #[serde(default = "default_true")]
    pub capture_return_len: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            exporter: SpanExporterKind::None,
            service_name: default_server_name(),
            attribute_prefix: default_attribute_prefix(),
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            redact_keys: BTreeSet::new(),
            arg_allowlist: None,
            arg_denylist: BTreeSet::new(),
            capture_return_len: true,
        }
    }
}

impl TelemetryConfig {
    /// Validates telemetry settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid("telemetry.service_name must be set".to_string()));
        }
        if !(MIN_MAX_VALUE_LEN..=MAX_MAX_VALUE_LEN).contains(&self.max_value_len) {
            return Err(ConfigError::Invalid(format!(
                "telemetry.max_value_len must be between {MIN_MAX_VALUE_LEN} and \
                 {MAX_MAX_VALUE_LEN}"
            )));
        }
        Ok(())
    }
}

/// Session log sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSinkKind {
    /// Messages are dropped.
    None,
    /// Messages are written to stderr as JSON lines.
    Stderr,
    /// Messages are forwarded to `tracing`.
    #[default]
    Tracing,
}

impl LogSinkKind {
    /// Parses a sink label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "stderr" => Some(Self::Stderr),
            "tracing" => Some(Self::Tracing),
            _ => None,
        }
    }
}

/// Session log sink settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LoggingConfig {
    /// Sink receiving session messages.
    #[serde(default)]
    pub sink: LogSinkKind,
    /// Lowest level forwarded.
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            sink: LogSinkKind::Tracing,
            min_level: LogLevel::Debug,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a boolean override.
fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{key} must be true or false"))),
    }
}

/// Default server name.
fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

/// Default client instructions.
fn default_instructions() -> String {
    DEFAULT_INSTRUCTIONS.to_string()
}

/// Default kubectl program.
fn default_program() -> String {
    KUBECTL_PROGRAM.to_string()
}

/// Default attribute prefix.
fn default_attribute_prefix() -> String {
    DEFAULT_ATTRIBUTE_PREFIX.to_string()
}

/// Default kubectl timeout.
const fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

/// Default attribute length.
const fn default_max_value_len() -> usize {
    DEFAULT_MAX_VALUE_LEN
}

/// Default minimum log level.
const fn default_min_level() -> LogLevel {
    LogLevel::Debug
}

/// Serde default for enabled flags.
const fn default_true() -> bool {
    true
}
